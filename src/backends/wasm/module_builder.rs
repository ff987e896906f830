//! WASM Module Builder
//!
//! Collects sections and emits them in the order the binary format requires:
//! Type, Function, Memory, Global, Export, Code.
//! Function types are deduplicated, so every distinct signature appears once.

use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use rustc_hash::FxHashMap;
use wasm_encoder::{
    CodeSection, ConstExpr, ExportKind, ExportSection, Function, FunctionSection, GlobalSection,
    GlobalType, MemorySection, MemoryType, Module, TypeSection, ValType,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub params: Vec<ValType>,
    pub results: Vec<ValType>,
}

pub struct WasmModuleBuilder {
    type_section: TypeSection,
    function_section: FunctionSection,
    memory_section: MemorySection,
    global_section: GlobalSection,
    export_section: ExportSection,
    code_section: CodeSection,

    type_count: u32,
    function_count: u32,
    global_count: u32,
    memory_count: u32,

    // Function indices declared but still waiting for a body
    pending_bodies: u32,

    type_cache: FxHashMap<FunctionType, u32>,
    export_names: Vec<String>,
}

impl WasmModuleBuilder {
    pub fn new() -> Self {
        WasmModuleBuilder {
            type_section: TypeSection::new(),
            function_section: FunctionSection::new(),
            memory_section: MemorySection::new(),
            global_section: GlobalSection::new(),
            export_section: ExportSection::new(),
            code_section: CodeSection::new(),
            type_count: 0,
            function_count: 0,
            global_count: 0,
            memory_count: 0,
            pending_bodies: 0,
            type_cache: FxHashMap::default(),
            export_names: Vec::new(),
        }
    }

    /// Add a function type and return its index, reusing an identical earlier type.
    pub fn add_function_type(&mut self, params: Vec<ValType>, results: Vec<ValType>) -> u32 {
        let func_type = FunctionType { params, results };
        if let Some(&existing_index) = self.type_cache.get(&func_type) {
            return existing_index;
        }

        let type_index = self.type_count;
        self.type_section
            .ty()
            .function(func_type.params.iter().copied(), func_type.results.iter().copied());
        self.type_count += 1;
        self.type_cache.insert(func_type, type_index);

        type_index
    }

    /// Declares a function with the given type. Its body must be added later in the same order.
    pub fn declare_function(&mut self, type_index: u32) -> u32 {
        let index = self.function_count;
        self.function_section.function(type_index);
        self.function_count += 1;
        self.pending_bodies += 1;
        index
    }

    pub fn add_function_body(&mut self, function: &Function) -> Result<(), CompilerError> {
        if self.pending_bodies == 0 {
            return Err(CompilerError::wasm_generation(
                "Function body added without a matching declaration",
            ));
        }
        self.code_section.function(function);
        self.pending_bodies -= 1;
        Ok(())
    }

    pub fn add_memory(&mut self, min_pages: u64, max_pages: Option<u64>) -> u32 {
        let index = self.memory_count;
        self.memory_section.memory(MemoryType {
            minimum: min_pages,
            maximum: max_pages,
            memory64: false,
            shared: false,
            page_size_log2: None,
        });
        self.memory_count += 1;
        index
    }

    pub fn add_global_i32(&mut self, initial: i32, mutable: bool) -> u32 {
        let index = self.global_count;
        self.global_section.global(
            GlobalType {
                val_type: ValType::I32,
                mutable,
                shared: false,
            },
            &ConstExpr::i32_const(initial),
        );
        self.global_count += 1;
        index
    }

    pub fn add_export(&mut self, name: &str, kind: ExportKind, index: u32) -> Result<(), CompilerError> {
        if self.export_names.iter().any(|existing| existing == name) {
            return Err(CompilerError::wasm_generation(format!(
                "Export '{name}' is defined twice"
            )));
        }
        self.export_section.export(name, kind, index);
        self.export_names.push(name.to_owned());
        Ok(())
    }

    pub fn function_count(&self) -> u32 {
        self.function_count
    }

    pub fn finish(self) -> Result<Vec<u8>, CompilerError> {
        if self.pending_bodies != 0 {
            return Err(CompilerError::wasm_generation(format!(
                "{} declared functions have no body",
                self.pending_bodies
            )));
        }

        let mut module = Module::new();
        module.section(&self.type_section);
        module.section(&self.function_section);
        if self.memory_count > 0 {
            module.section(&self.memory_section);
        }
        if self.global_count > 0 {
            module.section(&self.global_section);
        }
        if !self.export_names.is_empty() {
            module.section(&self.export_section);
        }
        module.section(&self.code_section);

        Ok(module.finish())
    }
}

impl Default for WasmModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
