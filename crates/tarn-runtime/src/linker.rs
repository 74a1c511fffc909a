//! Import resolution.
//!
//! Each import is matched against the packages in the order they were
//! supplied; inside a package bindings are scanned in order and the first
//! binding whose package and item names both match is taken. Later matches
//! are ignored, so package order works as a priority list.
//!
//! A binding that matches by name but not by kind or type aborts linking at
//! once with `FailImportTypeMismatch`. Imports nothing matched are reported
//! with `FailMissingImport` after every import has been examined. Nothing in
//! the store changes while linking.

use crate::host::{Binding, ImportPackage};
use crate::module::{Import, ImportDesc, Module};
use crate::store::{FuncSlot, GlobalAddr, MemAddr, Store, TableAddr};
use tarn_core::{Error, Result, Status, limits_compatible};

/// Store objects bound to a module's imports, in import order per kind.
#[derive(Debug, Default)]
pub(crate) struct ResolvedImports {
    pub(crate) functions: Vec<FuncSlot>,
    pub(crate) globals: Vec<GlobalAddr>,
    pub(crate) tables: Vec<TableAddr>,
    pub(crate) memories: Vec<MemAddr>,
}

fn find<'p>(packages: &'p [ImportPackage], import: &Import) -> Option<&'p Binding> {
    packages
        .iter()
        .filter(|p| p.name() == import.module)
        .find_map(|p| p.find(&import.name))
}

fn mismatch(import: &Import, detail: impl std::fmt::Display) -> Error {
    Error::instantiation(
        Status::FailImportTypeMismatch,
        format!("import {}.{}: {detail}", import.module, import.name),
    )
}

/// Resolves every import of `module`.
pub(crate) fn link(
    store: &Store,
    module: &Module,
    packages: &[ImportPackage],
) -> Result<ResolvedImports> {
    let mut resolved = ResolvedImports::default();
    let mut missing = Vec::new();

    for import in &module.imports {
        let Some(binding) = find(packages, import) else {
            missing.push(format!("{}.{}", import.module, import.name));
            continue;
        };

        match (&import.desc, binding) {
            (ImportDesc::Func { type_index }, Binding::Function(func)) => {
                let expected = module.types.get(*type_index as usize);
                let actual = store.func_type(*func);
                if actual.is_none() || actual != expected {
                    return Err(mismatch(
                        import,
                        format!(
                            "expected {}, found {}",
                            expected.map(ToString::to_string).unwrap_or_default(),
                            actual.map_or_else(|| "nothing".to_string(), ToString::to_string)
                        ),
                    ));
                }
                resolved.functions.push(FuncSlot::Imported(*func));
            }
            (ImportDesc::Func { type_index }, Binding::Host(host)) => {
                let expected = module.types.get(*type_index as usize);
                if expected != Some(host.ty()) {
                    return Err(mismatch(
                        import,
                        format!(
                            "expected {}, host function has {}",
                            expected.map(ToString::to_string).unwrap_or_default(),
                            host.ty()
                        ),
                    ));
                }
                resolved.functions.push(FuncSlot::Host(host.clone()));
            }
            (ImportDesc::Global { ty }, Binding::Global(addr)) => {
                let actual = store.global_type(*addr);
                if actual != Some(*ty) {
                    return Err(mismatch(import, "global type or mutability differs"));
                }
                resolved.globals.push(*addr);
            }
            (ImportDesc::Memory { limits }, Binding::Memory(addr)) => {
                let current = store
                    .memory(*addr)
                    .map(crate::memory::LinearMemory::limits);
                if !current.is_some_and(|c| limits_compatible(&c, limits)) {
                    return Err(mismatch(
                        import,
                        format!("memory limits incompatible with {limits}"),
                    ));
                }
                resolved.memories.push(*addr);
            }
            (ImportDesc::Table { ty }, Binding::Table(addr)) => {
                let compatible = store.table(*addr).is_some_and(|table| {
                    table.element_type() == ty.element
                        && limits_compatible(&table.limits(), &ty.limits)
                });
                if !compatible {
                    return Err(mismatch(
                        import,
                        format!("table incompatible with {} {}", ty.element, ty.limits),
                    ));
                }
                resolved.tables.push(*addr);
            }
            (desc, binding) => {
                return Err(mismatch(
                    import,
                    format!(
                        "expected a {}, found a {}",
                        desc.kind(),
                        binding.kind_name()
                    ),
                ));
            }
        }
        tracing::trace!(module = %import.module, name = %import.name, "import bound");
    }

    if !missing.is_empty() {
        return Err(Error::instantiation(
            Status::FailMissingImport,
            format!("unresolved imports: {}", missing.join(", ")),
        ));
    }
    Ok(resolved)
}
