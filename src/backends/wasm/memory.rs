//! Memory Manager
//!
//! Linear memory layout used by generated modules:
//! ```text
//! +----------------------+  <- memory.size * 64 KiB
//! | Heap (grows up)      |     bump allocated, never freed
//! +----------------------+  <- HEAP_START
//! | Frame stack (grows ↓)|     stack-allocated frames, popped on return
//! +----------------------+  <- STACK_LIMIT
//! | Reserved             |     address 0 is the null context
//! +----------------------+
//! ```
//!
//! Every struct slot is 8 bytes wide, so frames and instances are `slots * 8` bytes
//! and slot `n` lives at byte offset `n * 8`.

use crate::backends::wasm::module_builder::WasmModuleBuilder;
use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use wasm_encoder::{BlockType, ExportKind, Function, Instruction, MemArg, ValType};

pub const SLOT_SIZE: u32 = 8;
pub const HEAP_START: i32 = 64 * 1024;
pub const STACK_TOP: i32 = HEAP_START;
pub const STACK_LIMIT: i32 = 1024;
const PAGE_SHIFT: i32 = 16;

/// Closures are a heap pair of {function id, context pointer}
pub const CLOSURE_SIZE: u32 = 8;
pub const CLOSURE_FUNCTION_OFFSET: u64 = 0;
pub const CLOSURE_CONTEXT_OFFSET: u64 = 4;

#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// 64 KiB pages
    pub min_pages: u64,
    pub max_pages: Option<u64>,
    pub export_memory: bool,
    pub memory_export_name: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            min_pages: 2,
            max_pages: Some(1024),
            export_memory: true,
            memory_export_name: "memory".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MemoryIndices {
    pub memory_index: u32,
    pub heap_ptr_global: u32,
    pub stack_ptr_global: u32,
    pub alloc_func_index: u32,
}

pub struct MemoryManager {
    config: MemoryConfig,
}

impl MemoryManager {
    pub fn new(config: MemoryConfig) -> Self {
        MemoryManager { config }
    }

    /// Adds the memory, both pointer globals and the allocator.
    /// Must run before any other function is declared.
    pub fn setup_memory(
        &self,
        module_builder: &mut WasmModuleBuilder,
    ) -> Result<MemoryIndices, CompilerError> {
        let memory_index = module_builder.add_memory(self.config.min_pages, self.config.max_pages);
        let heap_ptr_global = module_builder.add_global_i32(HEAP_START, true);
        let stack_ptr_global = module_builder.add_global_i32(STACK_TOP, true);

        let alloc_type_index =
            module_builder.add_function_type(vec![ValType::I32], vec![ValType::I32]);
        let alloc_func_index = module_builder.declare_function(alloc_type_index);
        module_builder.add_function_body(&generate_alloc_function(heap_ptr_global))?;

        if self.config.export_memory {
            module_builder.add_export(
                &self.config.memory_export_name,
                ExportKind::Memory,
                memory_index,
            )?;
        }

        Ok(MemoryIndices {
            memory_index,
            heap_ptr_global,
            stack_ptr_global,
            alloc_func_index,
        })
    }
}

/// Bump allocator: `(size: i32) -> i32`.
/// Rounds the size up to a slot, grows memory when the heap runs past the end.
fn generate_alloc_function(heap_ptr_global: u32) -> Function {
    let mut func = Function::new(vec![
        (1, ValType::I32), // local 1: aligned size
        (1, ValType::I32), // local 2: result
    ]);

    // aligned = (size + 7) & !7
    func.instruction(&Instruction::LocalGet(0));
    func.instruction(&Instruction::I32Const(SLOT_SIZE as i32 - 1));
    func.instruction(&Instruction::I32Add);
    func.instruction(&Instruction::I32Const(!(SLOT_SIZE as i32 - 1)));
    func.instruction(&Instruction::I32And);
    func.instruction(&Instruction::LocalSet(1));

    func.instruction(&Instruction::GlobalGet(heap_ptr_global));
    func.instruction(&Instruction::LocalSet(2));

    func.instruction(&Instruction::LocalGet(2));
    func.instruction(&Instruction::LocalGet(1));
    func.instruction(&Instruction::I32Add);
    func.instruction(&Instruction::GlobalSet(heap_ptr_global));

    // if heap_ptr > memory.size << 16
    func.instruction(&Instruction::GlobalGet(heap_ptr_global));
    func.instruction(&Instruction::MemorySize(0));
    func.instruction(&Instruction::I32Const(PAGE_SHIFT));
    func.instruction(&Instruction::I32Shl);
    func.instruction(&Instruction::I32GtU);
    func.instruction(&Instruction::If(BlockType::Empty));

    // pages = (heap_ptr - (memory.size << 16) + 0xFFFF) >> 16
    func.instruction(&Instruction::GlobalGet(heap_ptr_global));
    func.instruction(&Instruction::MemorySize(0));
    func.instruction(&Instruction::I32Const(PAGE_SHIFT));
    func.instruction(&Instruction::I32Shl);
    func.instruction(&Instruction::I32Sub);
    func.instruction(&Instruction::I32Const(0xFFFF));
    func.instruction(&Instruction::I32Add);
    func.instruction(&Instruction::I32Const(PAGE_SHIFT));
    func.instruction(&Instruction::I32ShrU);
    func.instruction(&Instruction::MemoryGrow(0));

    // memory.grow returns -1 when the limit is reached
    func.instruction(&Instruction::I32Const(-1));
    func.instruction(&Instruction::I32Eq);
    func.instruction(&Instruction::If(BlockType::Empty));
    func.instruction(&Instruction::Unreachable);
    func.instruction(&Instruction::End);

    func.instruction(&Instruction::End);

    func.instruction(&Instruction::LocalGet(2));
    func.instruction(&Instruction::End);

    func
}

/// Stack effect: [] -> [ptr]
pub fn emit_heap_alloc(func: &mut Function, indices: &MemoryIndices, size: u32) {
    func.instruction(&Instruction::I32Const(size.max(SLOT_SIZE) as i32));
    func.instruction(&Instruction::Call(indices.alloc_func_index));
}

/// Pushes a frame onto the shadow stack, trapping on overflow.
///
/// Stack effect: [] -> [ptr]
pub fn emit_stack_alloc(func: &mut Function, indices: &MemoryIndices, size: u32) {
    let size = size.max(SLOT_SIZE).next_multiple_of(SLOT_SIZE);

    func.instruction(&Instruction::GlobalGet(indices.stack_ptr_global));
    func.instruction(&Instruction::I32Const(size as i32));
    func.instruction(&Instruction::I32Sub);
    func.instruction(&Instruction::GlobalSet(indices.stack_ptr_global));

    func.instruction(&Instruction::GlobalGet(indices.stack_ptr_global));
    func.instruction(&Instruction::I32Const(STACK_LIMIT));
    func.instruction(&Instruction::I32LtU);
    func.instruction(&Instruction::If(BlockType::Empty));
    func.instruction(&Instruction::Unreachable);
    func.instruction(&Instruction::End);

    func.instruction(&Instruction::GlobalGet(indices.stack_ptr_global));
}

pub fn emit_save_stack(func: &mut Function, indices: &MemoryIndices, saved_local: u32) {
    func.instruction(&Instruction::GlobalGet(indices.stack_ptr_global));
    func.instruction(&Instruction::LocalSet(saved_local));
}

pub fn emit_restore_stack(func: &mut Function, indices: &MemoryIndices, saved_local: u32) {
    func.instruction(&Instruction::LocalGet(saved_local));
    func.instruction(&Instruction::GlobalSet(indices.stack_ptr_global));
}

pub fn slot_offset(slot: u32) -> u32 {
    slot * SLOT_SIZE
}

pub fn i64_mem(offset: u64) -> MemArg {
    MemArg {
        offset,
        align: 3,
        memory_index: 0,
    }
}

pub fn i32_mem(offset: u64) -> MemArg {
    MemArg {
        offset,
        align: 2,
        memory_index: 0,
    }
}
