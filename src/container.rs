//! Thin helpers over the `hdf5` crate.
//!
//! Everything the mapping and reading layers need from the container is
//! funneled through here: enumerating children of a group, reading named
//! attributes, inspecting compound dtypes, and pulling row ranges of a
//! dataset into memory. Attribute readers return `Option` so a missing or
//! mistyped attribute can be handled as "absent" by the caller.

use hdf5::types::{TypeDescriptor, VarLenUnicode};
use hdf5::{Dataset, Group, H5Type, Location};
use ndarray::{s, Array2};

/// Read a string attribute, if present.
pub fn attr_str(loc: &Location, name: &str) -> Option<String> {
    let attr = loc.attr(name).ok()?;
    attr.read_scalar::<VarLenUnicode>().ok().map(|v| v.to_string())
}

/// Read an unsigned integer attribute, if present.
pub fn attr_u32(loc: &Location, name: &str) -> Option<u32> {
    loc.attr(name).ok()?.read_scalar::<u32>().ok()
}

/// Read a float attribute, if present.
pub fn attr_f64(loc: &Location, name: &str) -> Option<f64> {
    loc.attr(name).ok()?.read_scalar::<f64>().ok()
}

/// Read a 1-D float array attribute, if present.
pub fn attr_f64_array(loc: &Location, name: &str) -> Option<Vec<f64>> {
    let attr = loc.attr(name).ok()?;
    attr.read_1d::<f64>().ok().map(|a| a.to_vec())
}

/// Names of the children of `group` that are themselves groups.
pub fn subgroup_names(group: &Group) -> hdf5::Result<Vec<String>> {
    let mut names = Vec::new();
    for name in group.member_names()? {
        if group.group(&name).is_ok() {
            names.push(name);
        }
    }
    Ok(names)
}

/// Names of the children of `group` that are datasets.
pub fn dataset_names(group: &Group) -> hdf5::Result<Vec<String>> {
    let mut names = Vec::new();
    for name in group.member_names()? {
        if group.dataset(&name).is_ok() {
            names.push(name);
        }
    }
    Ok(names)
}

/// Member names of a compound dataset dtype, or `None` for non-compound.
pub fn compound_field_names(dset: &Dataset) -> hdf5::Result<Option<Vec<String>>> {
    let descriptor = dset.dtype()?.to_descriptor()?;
    match descriptor {
        TypeDescriptor::Compound(compound) => {
            Ok(Some(compound.fields.iter().map(|f| f.name.clone()).collect()))
        }
        _ => Ok(None),
    }
}

/// Read the selected rows of a 1-D (typically compound) dataset.
///
/// The container only supports contiguous range reads efficiently, so the
/// span covering the requested rows is read once and the rows are picked
/// out in memory.
pub fn read_rows_1d<T: H5Type + Clone>(dset: &Dataset, rows: &[usize]) -> hdf5::Result<Vec<T>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let lo = *rows.iter().min().unwrap();
    let hi = *rows.iter().max().unwrap() + 1;
    let span = dset.read_slice_1d::<T, _>(s![lo..hi])?;
    Ok(rows.iter().map(|&r| span[r - lo].clone()).collect())
}

/// Read the selected rows of a 2-D dataset into a matrix, one output row
/// per requested row, in request order.
pub fn read_rows_2d<T: H5Type + Clone + Default>(
    dset: &Dataset,
    rows: &[usize],
) -> hdf5::Result<Array2<T>> {
    let ncols = dset.shape().get(1).copied().unwrap_or(0);
    if rows.is_empty() {
        return Ok(Array2::from_elem((0, ncols), T::default()));
    }
    let lo = *rows.iter().min().unwrap();
    let hi = *rows.iter().max().unwrap() + 1;
    let span = dset.read_slice_2d::<T, _>(s![lo..hi, ..])?;
    let mut out = Array2::from_elem((rows.len(), ncols), T::default());
    for (i, &r) in rows.iter().enumerate() {
        out.row_mut(i).assign(&span.row(r - lo));
    }
    Ok(out)
}
