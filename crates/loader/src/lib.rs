// RegWired - SVD Register Map Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#![deny(missing_docs)]

//! # SVD loader
//!
//! Converts a CMSIS-SVD document into the RegWired device model. This crate
//! owns everything the emitter is allowed to assume away:
//!
//! - `derivedFrom` peripherals are resolved by deep-copying the converted
//!   prototype and applying the local overrides, so the model carries no
//!   derivation links.
//! - Register clusters and `dim` arrays are flattened into a plain register
//!   list with absolute offsets.
//! - Device-wide register defaults (size, reset value) are folded into each
//!   register.
//! - Field bit ranges are validated (inside the 32-bit register, pairwise
//!   disjoint) and registers with a size other than 32 are rejected.

use regwired_model::{Access, AddressBlock, Cpu, Device, Field, Interrupt, Peripheral, Register};
use std::collections::BTreeMap;
use svd_parser::svd;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur while loading an SVD document.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The XML could not be parsed as SVD.
    #[error("SVD parse error: {0}")]
    Parse(String),

    /// A peripheral derives from a prototype that does not precede it.
    #[error("peripheral {peripheral} derives from unknown peripheral {prototype}")]
    UnknownDerivedFrom {
        /// The derived peripheral's name.
        peripheral: String,
        /// The missing prototype's name.
        prototype: String,
    },

    /// A register's effective size is not the 32 bits the emitter lays out.
    #[error("register {register} has unsupported size {size}, only 32-bit registers are supported")]
    UnsupportedRegisterSize {
        /// The offending register's name.
        register: String,
        /// The effective size in bits.
        size: u32,
    },

    /// A register's fields violate the bit-layout invariant.
    #[error(transparent)]
    Layout(#[from] regwired_model::LayoutError),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Parses SVD XML and converts it into a device model.
pub fn load_device(xml: &str) -> Result<Device> {
    let parsed = svd_parser::parse(xml).map_err(|e| LoadError::Parse(format!("{:#}", e)))?;
    convert_device(&parsed)
}

/// Converts an already-parsed SVD device into the RegWired model.
pub fn convert_device(parsed: &svd::Device) -> Result<Device> {
    let mut device = Device {
        name: parsed.name.clone(),
        version: parsed.version.clone(),
        description: clean_text(&parsed.description),
        cpu: parsed.cpu.as_ref().map(convert_cpu),
        address_unit_bits: Some(parsed.address_unit_bits),
        max_bit_width: Some(parsed.width),
        reg_default_size: parsed.default_register_properties.size,
        reg_default_reset_value: parsed
            .default_register_properties
            .reset_value
            .map(|v| v as u32),
        reg_default_reset_mask: parsed
            .default_register_properties
            .reset_mask
            .map(|v| v as u32),
        peripherals: Vec::new(),
        interrupts: BTreeMap::new(),
    };

    for p in &parsed.peripherals {
        let peripheral = if let Some(prototype_name) = &p.derived_from {
            resolve_derived(p, prototype_name, &device)?
        } else {
            convert_peripheral(&device, p)?
        };

        for interrupt in &p.interrupt {
            let entry = Interrupt {
                name: interrupt.name.clone(),
                description: clean_text(interrupt.description.as_deref().unwrap_or("")),
                value: Some(interrupt.value),
            };
            if let Some(previous) = device.interrupts.insert(interrupt.value, entry) {
                if previous.name != interrupt.name {
                    warn!(
                        "interrupt {} redefines vector {} (was {})",
                        interrupt.name, interrupt.value, previous.name
                    );
                }
            }
        }

        device.peripherals.push(peripheral);
    }

    Ok(device)
}

/// Converts a single SVD peripheral, flattening its register tree.
///
/// `defaults` supplies the device-wide register properties; only peripherals
/// already converted into it are visible as derivation prototypes.
pub fn convert_peripheral(defaults: &Device, p: &svd::Peripheral) -> Result<Peripheral> {
    let mut registers = Vec::new();
    if let Some(children) = &p.registers {
        for cluster in children {
            flatten_cluster(cluster, 0, "", &p.name, defaults, &mut registers)?;
        }
    }

    Ok(Peripheral {
        name: p.name.clone(),
        group_name: p.group_name.clone().unwrap_or_default(),
        description: clean_text(p.description.as_deref().unwrap_or("")),
        base_address: Some(p.base_address as u32),
        address_block: convert_address_block(p),
        registers,
    })
}

// derivedFrom resolution: deep-copy the already-converted prototype, point
// the copy (and its back-pointer strings) at the new name, then apply the
// local overrides. Locally declared registers redefine same-named prototype
// registers and append otherwise.
fn resolve_derived(
    p: &svd::Peripheral,
    prototype_name: &str,
    device: &Device,
) -> Result<Peripheral> {
    let prototype = device
        .peripherals
        .iter()
        .find(|candidate| candidate.name == prototype_name)
        .ok_or_else(|| LoadError::UnknownDerivedFrom {
            peripheral: p.name.clone(),
            prototype: prototype_name.to_string(),
        })?;

    let mut copy = prototype.clone();
    copy.name = p.name.clone();
    for register in &mut copy.registers {
        register.periph_containing = p.name.clone();
        for field in &mut register.fields {
            field.periph = p.name.clone();
        }
    }

    copy.base_address = Some(p.base_address as u32);
    if let Some(description) = &p.description {
        copy.description = clean_text(description);
    }
    if let Some(group_name) = &p.group_name {
        copy.group_name = group_name.clone();
    }
    if let Some(block) = convert_address_block(p) {
        copy.address_block = Some(block);
    }

    if let Some(children) = &p.registers {
        let mut local = Vec::new();
        for cluster in children {
            flatten_cluster(cluster, 0, "", &p.name, device, &mut local)?;
        }
        for register in local {
            if let Some(existing) = copy.registers.iter_mut().find(|r| r.name == register.name) {
                *existing = register;
            } else {
                copy.registers.push(register);
            }
        }
    }

    Ok(copy)
}

/// Recursively flattens SVD clusters and register arrays into a flat list
/// with absolute offsets and `%s` placeholders substituted.
fn flatten_cluster(
    rc: &svd::RegisterCluster,
    parent_offset: u32,
    name_prefix: &str,
    periph: &str,
    defaults: &Device,
    out: &mut Vec<Register>,
) -> Result<()> {
    match rc {
        svd::RegisterCluster::Register(reg) => match reg {
            svd::Register::Single(info) => {
                let name = format!("{}{}", name_prefix, info.name);
                let offset = parent_offset + info.address_offset;
                out.push(convert_register(info, &name, offset, periph, defaults)?);
            }
            svd::Register::Array(info, dim) => {
                for i in 0..dim.dim {
                    let instance = replace_dim_name(&info.name, i, dim);
                    let name = format!("{}{}", name_prefix, instance);
                    let offset = parent_offset + info.address_offset + i * dim.dim_increment;
                    out.push(convert_register(info, &name, offset, periph, defaults)?);
                }
            }
        },
        svd::RegisterCluster::Cluster(cluster) => match cluster {
            svd::Cluster::Single(info) => {
                let prefix = format!("{}{}_", name_prefix, info.name);
                let offset = parent_offset + info.address_offset;
                for child in &info.children {
                    flatten_cluster(child, offset, &prefix, periph, defaults, out)?;
                }
            }
            svd::Cluster::Array(info, dim) => {
                for i in 0..dim.dim {
                    let instance = replace_dim_name(&info.name, i, dim);
                    let prefix = format!("{}{}_", name_prefix, instance);
                    let offset = parent_offset + info.address_offset + i * dim.dim_increment;
                    for child in &info.children {
                        flatten_cluster(child, offset, &prefix, periph, defaults, out)?;
                    }
                }
            }
        },
    }
    Ok(())
}

fn convert_register(
    info: &svd::RegisterInfo,
    name: &str,
    offset: u32,
    periph: &str,
    defaults: &Device,
) -> Result<Register> {
    let size = info
        .properties
        .size
        .or(defaults.reg_default_size)
        .unwrap_or(32);
    if size != 32 {
        return Err(LoadError::UnsupportedRegisterSize {
            register: name.to_string(),
            size,
        });
    }

    let reset_value = info
        .properties
        .reset_value
        .map(|v| v as u32)
        .or(defaults.reg_default_reset_value)
        .unwrap_or(0);

    let mut fields = Vec::new();
    if let Some(svd_fields) = &info.fields {
        for field in svd_fields {
            match field {
                svd::Field::Single(f) => {
                    fields.push(convert_field(f, &f.name, 0, name, periph, reset_value));
                }
                svd::Field::Array(f, dim) => {
                    for i in 0..dim.dim {
                        let instance = replace_dim_name(&f.name, i, dim);
                        let shift = i * dim.dim_increment;
                        fields.push(convert_field(f, &instance, shift, name, periph, reset_value));
                    }
                }
            }
        }
    }

    let register = Register {
        periph_containing: periph.to_string(),
        name: name.to_string(),
        display_name: info.display_name.clone().unwrap_or_default(),
        description: clean_text(info.description.as_deref().unwrap_or("")),
        address_offset: Some(offset),
        size,
        reset_value,
        fields,
        access: map_access(info.properties.access),
    };
    register.check_layout()?;
    Ok(register)
}

fn convert_field(
    f: &svd::FieldInfo,
    instance_name: &str,
    shift: u32,
    register: &str,
    periph: &str,
    register_reset_value: u32,
) -> Field {
    Field {
        periph: periph.to_string(),
        register: register.to_string(),
        register_reset_value,
        name: instance_name.to_string(),
        description: clean_text(f.description.as_deref().unwrap_or("")),
        bit_offset: Some(f.bit_range.offset + shift),
        bit_width: Some(f.bit_range.width),
        access: map_access(f.access),
    }
}

fn convert_cpu(cpu: &svd::Cpu) -> Cpu {
    Cpu {
        name: cpu.name.clone(),
        revision: cpu.revision.clone(),
        endian: endian_text(cpu.endian).to_string(),
        mpu_present: Some(cpu.mpu_present),
        fpu_present: Some(cpu.fpu_present),
        nvic_prio_bits: Some(cpu.nvic_priority_bits),
        vendor_systick_config: Some(cpu.has_vendor_systick),
    }
}

fn convert_address_block(p: &svd::Peripheral) -> Option<AddressBlock> {
    let block = p.address_block.as_ref()?.first()?;
    Some(AddressBlock {
        offset: Some(block.offset),
        size: Some(block.size),
        usage: usage_text(&block.usage).to_string(),
    })
}

fn endian_text(endian: svd::Endian) -> &'static str {
    match endian {
        svd::Endian::Little => "little",
        svd::Endian::Big => "big",
        svd::Endian::Selectable => "selectable",
        svd::Endian::Other => "other",
    }
}

fn usage_text(usage: &svd::AddressBlockUsage) -> &'static str {
    match usage {
        svd::AddressBlockUsage::Registers => "registers",
        svd::AddressBlockUsage::Buffer => "buffer",
        svd::AddressBlockUsage::Reserved => "reserved",
    }
}

fn map_access(access: Option<svd::Access>) -> Access {
    match access {
        Some(svd::Access::ReadOnly) => Access::ReadOnly,
        Some(svd::Access::WriteOnly) => Access::WriteOnly,
        Some(svd::Access::ReadWrite) => Access::ReadWrite,
        None => Access::ReadWrite,
        _ => Access::ReadWrite,
    }
}

// "%s" / "[%s]" index substitution for dim arrays, honoring an explicit
// dimIndex list when the SVD provides one.
fn replace_dim_name(name: &str, index: u32, dim: &svd::DimElement) -> String {
    let index_text = match &dim.dim_index {
        Some(indexes) if (index as usize) < indexes.len() => indexes[index as usize].clone(),
        _ => index.to_string(),
    };
    let replaced = name.replace("[%s]", &index_text).replace("%s", &index_text);
    if replaced == name {
        // No placeholder in the name, a common SVD quirk; append the index.
        format!("{}{}", name, index_text)
    } else {
        replaced
    }
}

// SVD descriptions are frequently wrapped and indented in the XML; collapse
// the whitespace runs so they stay single-line in the emitted comments.
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use svd_parser::svd::{BitRange, BitRangeType, ValidateLevel};

    fn empty_defaults() -> Device {
        Device::default()
    }

    fn make_register_info(name: &str, offset: u32) -> svd::RegisterInfo {
        let mut info = svd::RegisterInfo::builder()
            .name(name.to_string())
            .address_offset(offset)
            .build(ValidateLevel::Disabled)
            .unwrap();
        info.properties.size = Some(32);
        info.properties.reset_value = Some(0);
        info
    }

    fn make_field_info(name: &str, offset: u32, width: u32) -> svd::FieldInfo {
        svd::FieldInfo::builder()
            .name(name.to_string())
            .bit_range(BitRange {
                offset,
                width,
                range_type: BitRangeType::BitRange,
            })
            .build(ValidateLevel::Disabled)
            .unwrap()
    }

    #[test]
    fn register_conversion_fills_back_pointers() {
        let mut info = make_register_info("CR1", 0x10);
        info.properties.reset_value = Some(0xC0);
        info.fields = Some(vec![svd::Field::Single(make_field_info("EN", 0, 1))]);

        let register = convert_register(&info, "CR1", 0x10, "UART", &empty_defaults()).unwrap();
        assert_eq!(register.name, "CR1");
        assert_eq!(register.periph_containing, "UART");
        assert_eq!(register.address_offset, Some(0x10));
        assert_eq!(register.reset_value, 0xC0);
        assert_eq!(register.fields.len(), 1);
        assert_eq!(register.fields[0].register, "CR1");
        assert_eq!(register.fields[0].periph, "UART");
        assert_eq!(register.fields[0].register_reset_value, 0xC0);
        assert_eq!(register.fields[0].bit_offset, Some(0));
        assert_eq!(register.fields[0].bit_width, Some(1));
    }

    #[test]
    fn register_size_falls_back_to_device_default() {
        let mut info = make_register_info("CR1", 0);
        info.properties.size = None;
        info.properties.reset_value = None;

        let defaults = Device {
            reg_default_size: Some(32),
            reg_default_reset_value: Some(0xFFFF_FFFF),
            ..Default::default()
        };
        let register = convert_register(&info, "CR1", 0, "UART", &defaults).unwrap();
        assert_eq!(register.size, 32);
        assert_eq!(register.reset_value, 0xFFFF_FFFF);
    }

    #[test]
    fn non_32_bit_register_is_rejected() {
        let mut info = make_register_info("SMALL", 0);
        info.properties.size = Some(16);

        let err = convert_register(&info, "SMALL", 0, "UART", &empty_defaults()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::UnsupportedRegisterSize { size: 16, .. }
        ));
    }

    #[test]
    fn overlapping_fields_are_rejected() {
        let mut info = make_register_info("BAD", 0);
        info.fields = Some(vec![
            svd::Field::Single(make_field_info("A", 0, 4)),
            svd::Field::Single(make_field_info("B", 2, 4)),
        ]);

        let err = convert_register(&info, "BAD", 0, "UART", &empty_defaults()).unwrap_err();
        assert!(matches!(err, LoadError::Layout(_)));
    }

    #[test]
    fn field_arrays_are_unrolled() {
        let dim = svd::DimElement::builder()
            .dim(3)
            .dim_increment(2)
            .build(ValidateLevel::Disabled)
            .unwrap();
        let mut info = make_register_info("CH", 0);
        info.fields = Some(vec![svd::Field::Array(make_field_info("PIN%s", 0, 2), dim)]);

        let register = convert_register(&info, "CH", 0, "GPIO", &empty_defaults()).unwrap();
        assert_eq!(register.fields.len(), 3);
        assert_eq!(register.fields[0].name, "PIN0");
        assert_eq!(register.fields[0].bit_offset, Some(0));
        assert_eq!(register.fields[1].name, "PIN1");
        assert_eq!(register.fields[1].bit_offset, Some(2));
        assert_eq!(register.fields[2].name, "PIN2");
        assert_eq!(register.fields[2].bit_offset, Some(4));
    }

    #[test]
    fn dim_index_names_win_over_positions() {
        let dim = svd::DimElement::builder()
            .dim(2)
            .dim_increment(4)
            .dim_index(Some(vec!["A".to_string(), "B".to_string()]))
            .build(ValidateLevel::Disabled)
            .unwrap();
        assert_eq!(replace_dim_name("CTRL%s", 0, &dim), "CTRLA");
        assert_eq!(replace_dim_name("CTRL%s", 1, &dim), "CTRLB");
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(
            clean_text("Universal  synchronous\n        receiver"),
            "Universal synchronous receiver"
        );
        assert_eq!(clean_text(""), "");
    }
}
