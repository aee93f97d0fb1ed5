//! A small scripted runtime shared by the integration tests.
//!
//! The runtime knows one module with a handful of classes and methods. Argument ranges point
//! at leaked static buffers, so captured bytes can be compared against known contents.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use eltscope::{
    arguments::{ArgumentDescriptor, ArgumentRange},
    runtime::{
        ClassId, ClassIdInfo, EltHooks, EltInfo, EventMask, FrameInfo, FunctionId, FunctionInfo,
        Guid, HResult, MetadataImport, MethodProps, ModuleId, ModuleInfo, OpenFlags, ProfilerInfo,
        Token, TypeDefProps, IID_IMETADATA_IMPORT,
    },
};

pub const MODULE: ModuleId = ModuleId(0x7000);

pub const PROGRAM: ClassId = ClassId(0x100);
pub const STRING: ClassId = ClassId(0x200);
pub const LIST_OF_STRING: ClassId = ClassId(0x300);
pub const ARRAY: ClassId = ClassId(0x400);

pub const MAIN: FunctionId = FunctionId(0x1000);
pub const FIB: FunctionId = FunctionId(0x2000);
pub const PUSH: FunctionId = FunctionId(0x3000);
pub const SUM: FunctionId = FunctionId(0x4000);

struct Class {
    token: Token,
    name: &'static str,
    type_args: Vec<ClassId>,
}

struct Method {
    class: ClassId,
    token: Token,
    name: &'static str,
    arguments: Vec<&'static [u8]>,
}

/// The scripted runtime.
pub struct ScriptedRuntime {
    classes: HashMap<ClassId, Class>,
    methods: HashMap<FunctionId, Method>,
    hooks: Mutex<Option<EltHooks>>,
    mask: Mutex<Option<EventMask>>,
}

fn leak(bytes: &[u8]) -> &'static [u8] {
    Box::leak(bytes.to_vec().into_boxed_slice())
}

impl ScriptedRuntime {
    pub fn new() -> Arc<Self> {
        let mut classes = HashMap::new();
        classes.insert(
            PROGRAM,
            Class {
                token: Token(0x0200_0002),
                name: "Program",
                type_args: vec![],
            },
        );
        classes.insert(
            STRING,
            Class {
                token: Token(0x0200_0003),
                name: "String",
                type_args: vec![],
            },
        );
        classes.insert(
            LIST_OF_STRING,
            Class {
                token: Token(0x0200_0004),
                name: "List`1",
                type_args: vec![STRING],
            },
        );

        let mut methods = HashMap::new();
        methods.insert(
            MAIN,
            Method {
                class: PROGRAM,
                token: Token(0x0600_0001),
                name: "Main",
                arguments: vec![],
            },
        );
        methods.insert(
            FIB,
            Method {
                class: PROGRAM,
                token: Token(0x0600_0002),
                name: "Fib",
                arguments: vec![leak(&20u64.to_le_bytes())],
            },
        );
        methods.insert(
            PUSH,
            Method {
                class: LIST_OF_STRING,
                token: Token(0x0600_0003),
                name: "Push",
                arguments: vec![leak(&[0xAA; 8]), leak(&[1, 2, 3, 4])],
            },
        );
        methods.insert(
            SUM,
            Method {
                class: ARRAY,
                token: Token(0x0600_0004),
                name: "Sum",
                arguments: vec![leak(&[9; 16]), leak(&[8; 16]), leak(&[7; 16])],
            },
        );

        Arc::new(ScriptedRuntime {
            classes,
            methods,
            hooks: Mutex::new(None),
            mask: Mutex::new(None),
        })
    }

    /// The bytes each argument range of `function` covers.
    pub fn arguments_of(&self, function: FunctionId) -> Vec<Vec<u8>> {
        self.methods[&function]
            .arguments
            .iter()
            .map(|bytes| bytes.to_vec())
            .collect()
    }

    pub fn hooks(&self) -> Option<EltHooks> {
        *self.hooks.lock().unwrap()
    }

    pub fn mask(&self) -> Option<EventMask> {
        *self.mask.lock().unwrap()
    }
}

fn write_wide(value: &str, buffer: &mut [u16]) -> usize {
    let units: Vec<u16> = value.encode_utf16().collect();
    if let Some(room) = buffer.len().checked_sub(1) {
        let copied = units.len().min(room);
        buffer[..copied].copy_from_slice(&units[..copied]);
        buffer[copied] = 0;
    }
    units.len() + 1
}

impl ProfilerInfo for ScriptedRuntime {
    fn set_event_mask(&self, mask: EventMask) -> HResult {
        *self.mask.lock().unwrap() = Some(mask);
        HResult::S_OK
    }

    fn set_enter_leave_function_hooks3_with_info(&self, hooks: EltHooks) -> HResult {
        *self.hooks.lock().unwrap() = Some(hooks);
        HResult::S_OK
    }

    fn get_class_id_info2(
        &self,
        class: ClassId,
        type_args: &mut [ClassId],
    ) -> Result<ClassIdInfo, HResult> {
        if class == ARRAY {
            return Err(HResult::CLASSID_IS_ARRAY);
        }
        let entry = self.classes.get(&class).ok_or(HResult::E_INVALIDARG)?;
        let copied = entry.type_args.len().min(type_args.len());
        type_args[..copied].copy_from_slice(&entry.type_args[..copied]);
        Ok(ClassIdInfo {
            module: MODULE,
            token: entry.token,
            parent: ClassId::NULL,
            type_arg_count: entry.type_args.len(),
        })
    }

    fn get_function_info2(
        &self,
        function: FunctionId,
        _frame: FrameInfo,
        _type_args: &mut [ClassId],
    ) -> Result<FunctionInfo, HResult> {
        let method = self.methods.get(&function).ok_or(HResult::E_INVALIDARG)?;
        Ok(FunctionInfo {
            class: method.class,
            module: MODULE,
            token: method.token,
            type_arg_count: 0,
        })
    }

    fn get_function_enter3_info(
        &self,
        function: FunctionId,
        _elt: EltInfo,
        frame: &mut FrameInfo,
        size: &mut u32,
        buffer: &mut [u8],
    ) -> HResult {
        let Some(method) = self.methods.get(&function) else {
            return HResult::E_INVALIDARG;
        };
        let descriptor = ArgumentDescriptor::from_ranges(
            method
                .arguments
                .iter()
                .map(|bytes| ArgumentRange::new(bytes.as_ptr() as usize, bytes.len() as u32))
                .collect(),
        );
        let encoded = descriptor.to_bytes();
        let capacity = (*size as usize).min(buffer.len());
        *size = encoded.len() as u32;
        if encoded.len() > capacity {
            return HResult::INSUFFICIENT_BUFFER;
        }
        buffer[..encoded.len()].copy_from_slice(&encoded);
        *frame = FrameInfo(function.value() | 1);
        HResult::S_OK
    }

    fn get_module_info(&self, module: ModuleId, name: &mut [u16]) -> Result<ModuleInfo, HResult> {
        if module != MODULE {
            return Err(HResult::E_INVALIDARG);
        }
        Ok(ModuleInfo {
            base_address: 0x7FF0_0000,
            name_len: write_wide("/opt/app/Sample.dll", name),
        })
    }

    fn get_module_metadata(
        &self,
        module: ModuleId,
        _flags: OpenFlags,
        iid: Guid,
    ) -> Result<Arc<dyn MetadataImport>, HResult> {
        if iid != IID_IMETADATA_IMPORT {
            return Err(HResult::E_NOINTERFACE);
        }
        if module != MODULE {
            return Err(HResult::E_INVALIDARG);
        }
        let type_defs = self
            .classes
            .values()
            .map(|class| (class.token, class.name))
            .collect();
        let methods = self
            .methods
            .values()
            .map(|method| (method.token, method.name))
            .collect();
        Ok(Arc::new(ScriptedMetadata { type_defs, methods }))
    }
}

struct ScriptedMetadata {
    type_defs: HashMap<Token, &'static str>,
    methods: HashMap<Token, &'static str>,
}

impl MetadataImport for ScriptedMetadata {
    fn get_type_def_props(&self, token: Token, name: &mut [u16]) -> Result<TypeDefProps, HResult> {
        let type_name = self.type_defs.get(&token).ok_or(HResult::E_INVALIDARG)?;
        Ok(TypeDefProps {
            name_len: write_wide(type_name, name),
            flags: 0,
            extends: Token(0),
        })
    }

    fn get_method_props(&self, token: Token, name: &mut [u16]) -> Result<MethodProps, HResult> {
        let method_name = self.methods.get(&token).ok_or(HResult::E_INVALIDARG)?;
        Ok(MethodProps {
            class: Token(0),
            name_len: write_wide(method_name, name),
            attributes: 0,
        })
    }
}

/// Collects every emitted record.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<eltscope::events::EventRecord>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<eltscope::events::EventRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl eltscope::events::EventSink for RecordingSink {
    fn emit(&self, record: &eltscope::events::EventRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}
