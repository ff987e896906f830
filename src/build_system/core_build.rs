// Core compilation pipeline for one unit:
// - nested context analysis (captures, frame layouts, allocation)
// - LIR lowering
// - optional Wasm encoding

use crate::backends::lir::build_lir::lower_to_lir;
use crate::backends::lir::lir_nodes::LirModule;
use crate::backends::nested_context::NestedContext;
use crate::backends::wasm::encode::encode_wasm;
use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerMessages;
use crate::compiler_frontend::declarations::decl_nodes::DeclTree;
use crate::projects::settings::Config;
use crate::{layout_log, lir_log, timer_log};
use std::time::Instant;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitDumps {
    pub analysis: Option<String>,
    pub layouts: Option<String>,
    pub lir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub lir: LirModule,
    pub wasm: Option<Vec<u8>>,
    pub dumps: UnitDumps,
}

/// Runs the whole backend over one validated declaration tree.
pub fn compile_unit(tree: &DeclTree, config: &Config) -> Result<CompiledUnit, CompilerMessages> {
    let time = Instant::now();
    let nested = NestedContext::build(tree, config.frame_allocation)?;
    timer_log!(time, "Nested context built in: ");
    layout_log!(nested.layouts);

    let mut dumps = UnitDumps::default();
    if config.dumps.analysis {
        dumps.analysis = Some(nested.analysis.report(tree));
    }
    if config.dumps.layouts {
        dumps.layouts = Some(nested.layouts.to_string());
    }

    let time = Instant::now();
    let lir = lower_to_lir(&nested)?;
    timer_log!(time, "LIR lowered in: ");
    lir_log!(lir.to_string());

    if config.dumps.lir {
        dumps.lir = Some(lir.to_string());
    }

    let wasm = if config.emit_wasm {
        let time = Instant::now();
        let bytes = encode_wasm(&lir)?;
        timer_log!(time, "Wasm encoded in: ");
        Some(bytes)
    } else {
        None
    };

    Ok(CompiledUnit { lir, wasm, dumps })
}
