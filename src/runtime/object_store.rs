//! Runtime values and the object store behind frames and instances.

use crate::backends::lir::lir_nodes::{AllocKind, FrameTypeId, LirFunctionId};
use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Null,
    Object(ObjectId),
    SlotAddr {
        object: ObjectId,
        slot: u32,
    },
    Closure {
        function: LirFunctionId,
        context: Option<ObjectId>,
    },
}

impl Value {
    pub fn as_int(self) -> Result<i64, CompilerError> {
        match self {
            Value::Int(value) => Ok(value),
            other => Err(CompilerError::runtime_error(format!(
                "Expected an integer, found {other}"
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::Null => write!(f, "null"),
            Value::Object(id) => write!(f, "object#{}", id.0),
            Value::SlotAddr { object, slot } => write!(f, "object#{}.{}", object.0, slot),
            Value::Closure { function, context } => match context {
                Some(context) => write!(f, "closure({function}, object#{})", context.0),
                None => write!(f, "closure({function}, null)"),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Object {
    pub struct_type: FrameTypeId,
    pub kind: AllocKind,
    pub slots: Vec<Option<Value>>,

    /// Cleared when the stack frame's activation returns
    pub live: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub heap_allocations: usize,
    pub stack_allocations: usize,
    pub released: usize,
}

#[derive(Debug, Default)]
pub struct ObjectStore {
    objects: Vec<Object>,
    stats: StoreStats,
}

impl ObjectStore {
    pub fn allocate(&mut self, struct_type: FrameTypeId, kind: AllocKind, slot_count: usize) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(Object {
            struct_type,
            kind,
            slots: vec![None; slot_count],
            live: true,
        });

        match kind {
            AllocKind::Heap => self.stats.heap_allocations += 1,
            AllocKind::Stack => self.stats.stack_allocations += 1,
        }
        id
    }

    pub fn release(&mut self, id: ObjectId) {
        if let Some(object) = self.objects.get_mut(id.0 as usize) {
            if object.live {
                object.live = false;
                self.stats.released += 1;
            }
        }
    }

    /// A live object. Touching a released stack frame is a dangling frame access.
    pub fn get(&self, id: ObjectId) -> Result<&Object, CompilerError> {
        match self.objects.get(id.0 as usize) {
            Some(object) if object.live => Ok(object),
            Some(object) => Err(CompilerError::runtime_error(format!(
                "Dangling frame: object#{} ({}) was used after its activation returned",
                id.0, object.struct_type
            ))),
            None => Err(CompilerError::runtime_error(format!(
                "object#{} was never allocated",
                id.0
            ))),
        }
    }

    pub fn read_slot(&self, id: ObjectId, slot: u32) -> Result<Value, CompilerError> {
        let object = self.get(id)?;
        match object.slots.get(slot as usize) {
            Some(Some(value)) => Ok(*value),
            Some(None) => Err(CompilerError::runtime_error(format!(
                "Read of unset slot {} of object#{} ({})",
                slot, id.0, object.struct_type
            ))),
            None => Err(CompilerError::runtime_error(format!(
                "Slot {} is out of range for object#{}",
                slot, id.0
            ))),
        }
    }

    pub fn write_slot(&mut self, id: ObjectId, slot: u32, value: Value) -> Result<(), CompilerError> {
        self.get(id)?;
        match self
            .objects
            .get_mut(id.0 as usize)
            .and_then(|object| object.slots.get_mut(slot as usize))
        {
            Some(target) => {
                *target = Some(value);
                Ok(())
            }
            None => Err(CompilerError::runtime_error(format!(
                "Slot {} is out of range for object#{}",
                slot, id.0
            ))),
        }
    }

    pub fn is_live(&self, id: ObjectId) -> bool {
        self.objects.get(id.0 as usize).is_some_and(|o| o.live)
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }
}
