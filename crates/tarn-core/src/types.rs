//! Value types and function signature interning.

use crate::ids::TypeIdx;
use crate::index_vec::IndexVec;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// One of the four WebAssembly value types.
///
/// The absence of a value ("void") is represented as `Option<ValType> =
/// None`; it is not a value type and never appears in signatures as a
/// parameter, in local declarations, or as a block result.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum ValType {
    I32,
    I64,
    F32,
    F64,
}

impl ValType {
    /// The canonical one-byte type tag of the binary format.
    pub fn tag(self) -> u8 {
        match self {
            ValType::I32 => 0x7F,
            ValType::I64 => 0x7E,
            ValType::F32 => 0x7D,
            ValType::F64 => 0x7C,
        }
    }

    /// Natural access width in bytes.
    pub fn byte_size(self) -> u32 {
        match self {
            ValType::I32 | ValType::F32 => 4,
            ValType::I64 | ValType::F64 => 8,
        }
    }

    /// Base-2 logarithm of the natural access width, emitted as the
    /// alignment hint of load/store instructions.
    pub fn align_exp(self) -> u32 {
        match self {
            ValType::I32 | ValType::F32 => 2,
            ValType::I64 | ValType::F64 => 3,
        }
    }

    /// Parse a reserved type identifier.
    pub fn from_name(name: &str) -> Option<ValType> {
        match name {
            "i32" => Some(ValType::I32),
            "i64" => Some(ValType::I64),
            "f32" => Some(ValType::F32),
            "f64" => Some(ValType::F64),
            _ => None,
        }
    }
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValType::I32 => "i32",
            ValType::I64 => "i64",
            ValType::F32 => "f32",
            ValType::F64 => "f64",
        };
        write!(f, "{name}")
    }
}

/// A function signature: ordered parameter types and an optional result.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct FuncSig {
    pub params: Vec<ValType>,
    pub ret: Option<ValType>,
}

impl fmt::Display for FuncSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ")")?;
        match self.ret {
            Some(ty) => write!(f, " -> {ty}"),
            None => write!(f, " -> void"),
        }
    }
}

/// Signature interner backing the Type section.
///
/// Structurally equal signatures map to the same dense [`TypeIdx`]; the
/// insertion order is the emission order of the Type section.
#[derive(Debug, Default)]
pub struct SigInterner {
    cache: HashMap<FuncSig, TypeIdx>,
    sigs: IndexVec<TypeIdx, FuncSig>,
}

impl SigInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a signature, returning its dense index.
    pub fn intern(&mut self, sig: FuncSig) -> TypeIdx {
        if let Some(&idx) = self.cache.get(&sig) {
            return idx;
        }
        let idx = self.sigs.push(sig.clone());
        self.cache.insert(sig, idx);
        idx
    }

    pub fn get(&self, idx: TypeIdx) -> &FuncSig {
        &self.sigs[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = &FuncSig> {
        self.sigs.iter()
    }

    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_val_type_encoding() {
        assert_eq!(ValType::I32.tag(), 0x7F);
        assert_eq!(ValType::I64.tag(), 0x7E);
        assert_eq!(ValType::F32.tag(), 0x7D);
        assert_eq!(ValType::F64.tag(), 0x7C);

        assert_eq!(ValType::I32.align_exp(), 2);
        assert_eq!(ValType::F64.align_exp(), 3);
        assert_eq!(ValType::I64.byte_size(), 8);
    }

    #[test]
    fn test_from_name_rejects_void() {
        assert_eq!(ValType::from_name("i64"), Some(ValType::I64));
        assert_eq!(ValType::from_name("void"), None);
        assert_eq!(ValType::from_name("u32"), None);
    }

    #[test]
    fn test_signature_deduplication() {
        let mut sigs = SigInterner::new();

        let a = sigs.intern(FuncSig {
            params: vec![ValType::I32, ValType::I32],
            ret: Some(ValType::I32),
        });
        let b = sigs.intern(FuncSig {
            params: vec![ValType::I32, ValType::I32],
            ret: Some(ValType::I32),
        });
        let c = sigs.intern(FuncSig {
            params: vec![ValType::I32],
            ret: Some(ValType::I32),
        });
        let d = sigs.intern(FuncSig {
            params: vec![ValType::I32, ValType::I32],
            ret: None,
        });

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(sigs.len(), 3);
        assert_eq!(sigs.get(a).params.len(), 2);
    }
}
