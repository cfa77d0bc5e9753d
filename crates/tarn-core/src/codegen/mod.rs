//! WebAssembly binary generation.
//!
//! Function bodies are emitted first; the module assembler then writes the
//! magic header, version, and the sections in ascending id order, each
//! staged in a secondary buffer and length-prefixed. Optional sections are
//! omitted when empty.

mod func;
pub mod opcodes;
pub mod writer;

use crate::decls;
use crate::error::CompileError;
use crate::interner::Interner;
use crate::syntax::ast::{Ast, Node};
use crate::types::SigInterner;
use self::func::FuncEmitter;
use self::writer::Writer;

pub const MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];
pub const VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Section ids, in the only order they may appear.
pub mod section {
    pub const TYPE: u8 = 1;
    pub const IMPORT: u8 = 2;
    pub const FUNCTION: u8 = 3;
    pub const MEMORY: u8 = 5;
    pub const EXPORT: u8 = 7;
    pub const CODE: u8 = 10;
}

const FUNC_EXPORT_KIND: u8 = 0x00;
const MEM_EXPORT_KIND: u8 = 0x02;
const FUNC_IMPORT_KIND: u8 = 0x00;

/// Compile an analyzed AST into a complete module.
pub fn generate(ast: &Ast, interner: &Interner) -> Result<Vec<u8>, CompileError> {
    let mut sigs = SigInterner::new();
    let decls = decls::collect(ast, &mut sigs, interner)?;

    let mut bodies = Vec::with_capacity(decls.defs.len());
    for &(id, _) in &decls.defs {
        let Node::Func(func) = ast.node(id) else {
            unreachable!("non-function in definition list")
        };
        tracing::debug!(name = %func.name, "emitting function body");
        bodies.push(FuncEmitter::emit(func, ast, &decls, interner)?);
    }

    let mut out = Writer::new();
    out.bytes(&MAGIC);
    out.bytes(&VERSION);

    if !sigs.is_empty() {
        let mut sec = Writer::new();
        sec.uleb(sigs.len() as u32);
        for sig in sigs.iter() {
            sec.byte(0x60);
            sec.uleb(sig.params.len() as u32);
            for ty in &sig.params {
                sec.byte(ty.tag());
            }
            match sig.ret {
                Some(ty) => {
                    sec.uleb(1);
                    sec.byte(ty.tag());
                }
                None => sec.uleb(0),
            }
        }
        out.section(section::TYPE, &sec);
    }

    if !decls.imports.is_empty() {
        let mut sec = Writer::new();
        sec.uleb(decls.imports.len() as u32);
        for imp in &decls.imports {
            sec.name(&imp.module);
            sec.name(&imp.field);
            sec.byte(FUNC_IMPORT_KIND);
            sec.uleb(imp.type_idx.0);
        }
        out.section(section::IMPORT, &sec);
    }

    if !decls.defs.is_empty() {
        let mut sec = Writer::new();
        sec.uleb(decls.defs.len() as u32);
        for &(_, type_idx) in &decls.defs {
            sec.uleb(type_idx.0);
        }
        out.section(section::FUNCTION, &sec);
    }

    if decls.uses_memory {
        let mut sec = Writer::new();
        sec.uleb(1); // one memory
        sec.byte(0x00); // no maximum
        sec.uleb(1); // one initial page
        out.section(section::MEMORY, &sec);
    }

    if !decls.exports.is_empty() || decls.uses_memory {
        let mut records: Vec<(&str, u8, u32)> = Vec::new();
        for name in &decls.exports {
            // `(export memory)` is satisfied by the automatic memory
            // export appended below.
            if name == "memory" && decls.uses_memory {
                continue;
            }
            let info = decls
                .lookup(interner.intern(name))
                .ok_or_else(|| CompileError::UndefinedFunction(name.clone()))?;
            records.push((name, FUNC_EXPORT_KIND, info.index.0));
        }
        if decls.uses_memory {
            records.push(("memory", MEM_EXPORT_KIND, 0));
        }

        let mut sec = Writer::new();
        sec.uleb(records.len() as u32);
        for (name, kind, index) in records {
            sec.name(name);
            sec.byte(kind);
            sec.uleb(index);
        }
        out.section(section::EXPORT, &sec);
    }

    if !bodies.is_empty() {
        let mut sec = Writer::new();
        sec.uleb(bodies.len() as u32);
        for body in &bodies {
            sec.bytes(body);
        }
        out.section(section::CODE, &sec);
    }

    tracing::debug!(bytes = out.len(), "assembled module");
    Ok(out.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;

    fn generate_source(source: &str) -> Result<Vec<u8>, CompileError> {
        let interner = Interner::new();
        let ast = parse(source).map_err(CompileError::from)?;
        generate(&ast, &interner)
    }

    /// Split a module into (section id, content) pairs.
    fn sections(module: &[u8]) -> Vec<(u8, Vec<u8>)> {
        assert_eq!(&module[..4], &MAGIC);
        assert_eq!(&module[4..8], &VERSION);
        let mut out = Vec::new();
        let mut pos = 8;
        while pos < module.len() {
            let id = module[pos];
            pos += 1;
            // Content lengths in these tests stay below 128, so the size
            // prefix is a single LEB byte.
            let len = module[pos] as usize;
            assert!(module[pos] & 0x80 == 0, "multi-byte section size");
            pos += 1;
            out.push((id, module[pos..pos + len].to_vec()));
            pos += len;
        }
        out
    }

    #[test]
    fn test_header() {
        let module = generate_source("(fn f () i32 1)").unwrap();
        assert_eq!(
            &module[..8],
            &[0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_empty_module_is_header_only() {
        let module = generate_source("").unwrap();
        assert_eq!(module.len(), 8);
    }

    #[test]
    fn test_section_order_minimal() {
        let module = generate_source("(fn f () i32 1)").unwrap();
        let ids: Vec<u8> = sections(&module).iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![section::TYPE, section::FUNCTION, section::CODE]);
    }

    #[test]
    fn test_section_order_full() {
        let module = generate_source(
            "(import env log ((x i32))) \
             (fn f ((p i32)) i32 (store i32 p 1) (load i32 p)) \
             (export f)",
        )
        .unwrap();
        let ids: Vec<u8> = sections(&module).iter().map(|(id, _)| *id).collect();
        assert_eq!(
            ids,
            vec![
                section::TYPE,
                section::IMPORT,
                section::FUNCTION,
                section::MEMORY,
                section::EXPORT,
                section::CODE
            ]
        );
    }

    #[test]
    fn test_type_section_entries() {
        let module =
            generate_source("(import sys time () i64) (fn f ((a i32) (b f64)) i64 (time))")
                .unwrap();
        let secs = sections(&module);
        let (_, type_sec) = &secs[0];
        // Imports intern their signatures first.
        assert_eq!(
            type_sec,
            &vec![
                0x02, // count
                0x60, 0x00, 0x01, 0x7E, // () -> i64
                0x60, 0x02, 0x7F, 0x7C, 0x01, 0x7E, // (i32, f64) -> i64
            ]
        );
    }

    #[test]
    fn test_shared_signature_single_type_entry() {
        let module =
            generate_source("(fn a ((x i32)) i32 x) (fn b ((y i32)) i32 y)").unwrap();
        let secs = sections(&module);
        let (_, type_sec) = &secs[0];
        assert_eq!(type_sec[0], 0x01, "one deduplicated signature");
        let (_, func_sec) = &secs[1];
        // Both functions reference type 0.
        assert_eq!(func_sec, &vec![0x02, 0x00, 0x00]);
    }

    #[test]
    fn test_import_section_bytes() {
        let module = generate_source("(import env log ((x i32)))").unwrap();
        let secs = sections(&module);
        let (id, import_sec) = &secs[1];
        assert_eq!(*id, section::IMPORT);
        let mut expected = vec![0x01];
        expected.extend(b"\x03env");
        expected.extend(b"\x03log");
        expected.extend([0x00, 0x00]); // function kind, type 0
        assert_eq!(import_sec, &expected);
    }

    #[test]
    fn test_memory_section_bytes() {
        let module = generate_source("(fn f () i32 (load i32 0))").unwrap();
        let secs = sections(&module);
        let mem = secs
            .iter()
            .find(|(id, _)| *id == section::MEMORY)
            .map(|(_, c)| c.clone())
            .unwrap();
        // One memory, no maximum, one initial page.
        assert_eq!(mem, vec![0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_memory_is_exported_automatically() {
        let module = generate_source("(fn f () i32 (load i32 0))").unwrap();
        let secs = sections(&module);
        let export = secs
            .iter()
            .find(|(id, _)| *id == section::EXPORT)
            .map(|(_, c)| c.clone())
            .unwrap();
        let mut expected = vec![0x01];
        expected.extend(b"\x06memory");
        expected.extend([0x02, 0x00]); // memory kind, index 0
        assert_eq!(export, expected);
    }

    #[test]
    fn test_export_memory_directive_is_satisfied_by_auto_export() {
        let module = generate_source(
            "(fn f ((p i32)) i32 (load i32 p)) (export f) (export memory)",
        )
        .unwrap();
        let secs = sections(&module);
        let export = secs
            .iter()
            .find(|(id, _)| *id == section::EXPORT)
            .map(|(_, c)| c.clone())
            .unwrap();
        // f as function 0, then one memory export; no duplicate.
        let mut expected = vec![0x02];
        expected.extend(b"\x01f");
        expected.extend([0x00, 0x00]);
        expected.extend(b"\x06memory");
        expected.extend([0x02, 0x00]);
        assert_eq!(export, expected);
    }

    #[test]
    fn test_export_memory_without_memory_use_fails() {
        let err = generate_source("(fn f () i32 1) (export memory)").unwrap_err();
        assert!(matches!(err, CompileError::UndefinedFunction(_)));
    }

    #[test]
    fn test_export_indices_resolve_through_function_table() {
        let module = generate_source(
            "(import env a ()) (fn b () i32 1) (export b)",
        )
        .unwrap();
        let secs = sections(&module);
        let export = secs
            .iter()
            .find(|(id, _)| *id == section::EXPORT)
            .map(|(_, c)| c.clone())
            .unwrap();
        // b sits after the import at global index 1.
        let mut expected = vec![0x01];
        expected.extend(b"\x01b");
        expected.extend([0x00, 0x01]);
        assert_eq!(export, expected);
    }

    #[test]
    fn test_export_of_unknown_function() {
        let err = generate_source("(fn a () i32 0) (export b)").unwrap_err();
        assert!(matches!(err, CompileError::UndefinedFunction(_)));
    }

    #[test]
    fn test_duplicate_export_rejected() {
        let err = generate_source("(fn a () i32 0) (export a) (export a)").unwrap_err();
        assert!(matches!(err, CompileError::DuplicateDefinition(_)));
    }

    #[test]
    fn test_determinism() {
        let source = "(import env log ((x i32))) \
                      (fn f ((p i32)) i32 (var i i32 0) (while (< i 4) (set i (+ i 1))) (load i32 p)) \
                      (export f)";
        let a = generate_source(source).unwrap();
        let b = generate_source(source).unwrap();
        assert_eq!(a, b);
    }
}
