//! Registry-assembly assertions: core presence and dependency closure.

use std::cmp::Ordering;
use std::collections::HashMap;

use engine_core::{Error, Result};

use crate::column::{Columns, Interface};

/// Every interface in `core` must be implemented by some column.
pub fn assert_all_core_columns_present(columns: &Columns, core: &[Interface]) -> Result<()> {
    let infos = columns.infos();
    for iface in core {
        if !infos.iter().any(|c| c.interface.id == iface.id) {
            return Err(Error::dependency(format!(
                "core column {} is required but not present in columns",
                iface.id
            )));
        }
    }
    Ok(())
}

/// Every declared dependency must resolve to a present column within its
/// version range.
pub fn assert_all_dependencies_fulfilled(columns: &Columns) -> Result<()> {
    let infos = columns.infos();
    let by_id: HashMap<&str, &Interface> = infos
        .iter()
        .map(|c| (c.interface.id.as_str(), c.interface))
        .collect();

    for column in &infos {
        for dep in column.depends_on {
            let target = by_id.get(dep.interface.as_str()).ok_or_else(|| {
                Error::dependency(format!(
                    "column {} depends on {}, which is not present",
                    column.interface.id, dep.interface
                ))
            })?;

            let present = &target.version;
            if present.components().is_none() {
                return Err(Error::dependency(format!(
                    "column {} has invalid version format {}",
                    target.id, present
                )));
            }

            let too_old = match &dep.greater_or_equal_to {
                Some(lo) => check(present, lo)? == Ordering::Less,
                None => false,
            };
            let too_new = match &dep.less_than {
                Some(hi) => check(present, hi)? != Ordering::Less,
                None => false,
            };
            if too_old || too_new {
                return Err(Error::dependency(format!(
                    "column {} depends on {} {}, but version {} is present",
                    column.interface.id,
                    dep.interface,
                    dep.range(),
                    present
                )));
            }
        }
    }
    Ok(())
}

/// Both assertions, core presence first.
pub fn assert_all_dependencies_fulfilled_with_core_columns(
    columns: &Columns,
    core: &[Interface],
) -> Result<()> {
    assert_all_core_columns_present(columns, core)?;
    assert_all_dependencies_fulfilled(columns)
}

fn check(present: &crate::column::Version, bound: &crate::column::Version) -> Result<Ordering> {
    present
        .compare(bound)
        .ok_or_else(|| Error::dependency(format!("invalid version constraint {}", bound)))
}
