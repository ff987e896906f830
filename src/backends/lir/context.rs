//! Lowering Context
//!
//! State for lowering declaration bodies into LIR. Function indices live for the whole
//! unit. Per-function state (local mapping, the activation's view of the static chain) is
//! reset before each function.

use crate::backends::lir::emitter::LirFunctionBuilder;
use crate::backends::lir::lir_nodes::{
    ClosureSignature, LirFunction, LirFunctionId, LirLocalId, LirType,
};
use crate::backends::nested_context::frame_layout::storage_type;
use crate::backends::nested_context::{FunctionContext, NestedContext};
use crate::compiler_frontend::compiler_messages::compiler_errors::{
    CompilerError, ErrorMetaDataKey,
};
use crate::compiler_frontend::declarations::decl_nodes::{DeclId, ValueType, VarId};
use crate::{lir_log, return_compiler_error};
use rustc_hash::FxHashMap;

#[derive(Debug)]
pub struct LoweringContext<'a> {
    pub nested: &'a NestedContext<'a>,

    /// Maps every function declaration (methods included) to its LIR function
    pub function_indices: FxHashMap<DeclId, LirFunctionId>,

    /// Non-captured parameters and locals of the function being lowered
    pub var_to_local: FxHashMap<VarId, LirLocalId>,

    /// The function being lowered and what it can see of the static chain
    pub current: Option<FunctionContext>,

    next_function_index: u32,
}

impl<'a> LoweringContext<'a> {
    pub fn new(nested: &'a NestedContext<'a>) -> Self {
        LoweringContext {
            nested,
            function_indices: FxHashMap::default(),
            var_to_local: FxHashMap::default(),
            current: None,
            next_function_index: 0,
        }
    }

    pub fn reset_for_function(&mut self) {
        self.var_to_local.clear();
        self.current = None;
    }

    pub fn register_function(&mut self, decl: DeclId) -> LirFunctionId {
        if let Some(&id) = self.function_indices.get(&decl) {
            return id;
        }
        let id = LirFunctionId(self.next_function_index);
        self.next_function_index += 1;
        self.function_indices.insert(decl, id);
        id
    }

    pub fn function_index(&self, decl: DeclId) -> Result<LirFunctionId, CompilerError> {
        match self.function_indices.get(&decl) {
            Some(id) => Ok(*id),
            None => return_compiler_error!(
                "Function '{}' was never registered for lowering",
                self.nested.tree.qualified_name(decl)
            ),
        }
    }

    pub fn function_context(&self) -> Result<FunctionContext, CompilerError> {
        match self.current {
            Some(context) => Ok(context),
            None => return_compiler_error!("Body lowering started outside of a function"),
        }
    }

    pub fn local_of(&self, var: VarId) -> Result<LirLocalId, CompilerError> {
        match self.var_to_local.get(&var) {
            Some(local) => Ok(*local),
            None => return_compiler_error!(
                "'{}' has no local in the current function",
                self.nested.tree.variable_name(var)
            ),
        }
    }

    pub fn return_type(ty: &ValueType) -> Result<Option<LirType>, CompilerError> {
        if ty.is_unit() {
            return Ok(None);
        }
        storage_type(ty).map(Some)
    }

    pub fn closure_signature(ty: &ValueType) -> Result<ClosureSignature, CompilerError> {
        let ValueType::Function { params, ret } = ty else {
            return_compiler_error!("Expected a function value, found {}", ty);
        };

        let params = params
            .iter()
            .map(storage_type)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ClosureSignature {
            params,
            ret: Self::return_type(ret)?,
        })
    }

    /// Lowers one function declaration, prologue included.
    pub fn lower_function_def(&mut self, decl_id: DeclId) -> Result<LirFunction, CompilerError> {
        let nested = self.nested;
        let tree = nested.tree;
        let decl = tree.decl(decl_id)?;
        let function = tree.function(decl_id)?;
        let analysis = &nested.analysis;

        self.reset_for_function();
        let id = self.function_index(decl_id)?;

        let mut params = Vec::with_capacity(function.params.len());
        for param in &function.params {
            params.push(storage_type(&tree.variable(*param)?.ty)?);
        }
        let ret = Self::return_type(&function.return_type)?;

        let mut builder = LirFunctionBuilder::new(
            id,
            tree.qualified_name(decl_id),
            decl_id,
            decl.parent.is_some(),
            params,
            ret,
        );

        let incoming = match builder.context_local() {
            Some(local) => Some(builder.local_get(local)?),
            None => None,
        };

        // Captured parameters are read once and moved into the frame by the prologue
        let mut arrived = Vec::new();
        for (index, param) in function.params.iter().enumerate() {
            let local = builder.param_local(index);
            if analysis.is_captured(*param) {
                arrived.push((*param, builder.local_get(local)?));
            } else {
                self.var_to_local.insert(*param, local);
            }
        }

        for var in &decl.locals[function.params.len()..] {
            if analysis.is_captured(*var) {
                continue;
            }
            let ty = storage_type(&tree.variable(*var)?.ty)?;
            let local = builder.add_local(ty);
            self.var_to_local.insert(*var, local);
        }

        let context = nested.enter_function(&mut builder, decl_id, incoming, &arrived)?;
        self.current = Some(context);

        self.lower_block(&mut builder, &function.body)?;

        match ret {
            None => builder.ret(None),
            Some(_) => builder.unreachable(),
        }

        let lowered = builder.finish()?;
        lir_log!("Lowered ", Green {lowered.name.as_str()}, " with ", {lowered.body.len()}, " instructions");

        Ok(lowered)
    }

    pub fn lowering_error(&self, msg: impl Into<String>) -> CompilerError {
        let mut error = CompilerError::compiler_error(msg)
            .with_metadata(ErrorMetaDataKey::CompilationStage, "body lowering");
        if let Some(current) = self.current {
            error = error
                .with_declaration(current.decl)
                .with_declaration_path(self.nested.tree.qualified_name(current.decl));
        }
        error
    }
}
