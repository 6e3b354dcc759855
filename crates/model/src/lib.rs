// RegWired - SVD Register Map Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! RegWired device model
//!
//! This crate defines the plain, serializable value tree that describes an
//! SVD device: device -> peripherals -> registers -> fields, plus interrupts
//! and CPU metadata. It is the common language between:
//!
//! 1. **The loader**: which populates the tree from an SVD document.
//! 2. **The emitter**: which renders the tree as Zig register definitions.
//!
//! The tree is strictly owned top-down; the "back-pointer" strings on
//! [`Register`] and [`Field`] are value copies, not references, so cloning
//! any subtree yields a fully independent copy.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// The top-level root of a chip description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Device {
    /// The name of the device (e.g., "STM32F103").
    pub name: String,

    /// Vendor revision of the description (SVD `version`).
    pub version: String,

    /// Free-text description of the device. Empty when the SVD omits it.
    pub description: String,

    /// CPU metadata, at most one per device.
    pub cpu: Option<Cpu>,

    /// Bits per addressable unit (SVD `addressUnitBits`).
    pub address_unit_bits: Option<u32>,

    /// Maximum data bit width accessible in a single transfer (SVD `width`).
    pub max_bit_width: Option<u32>,

    /// Device-wide default register size in bits.
    pub reg_default_size: Option<u32>,

    /// Device-wide default register reset value.
    pub reg_default_reset_value: Option<u32>,

    /// Device-wide default register reset mask.
    pub reg_default_reset_mask: Option<u32>,

    /// Peripherals in document order.
    pub peripherals: Vec<Peripheral>,

    /// Interrupts keyed by vector number. A `BTreeMap` so iteration (and
    /// therefore the emitted interrupt table) is sorted by number.
    pub interrupts: BTreeMap<u32, Interrupt>,
}

/// CPU metadata attached to a device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU core name (e.g., "CM4").
    pub name: String,

    /// Core revision (e.g., "r0p1").
    pub revision: String,

    /// Endianness as lowercase text ("little", "big", ...).
    pub endian: String,

    /// Whether a memory protection unit is present.
    pub mpu_present: Option<bool>,

    /// Whether a floating point unit is present.
    pub fpu_present: Option<bool>,

    /// Number of NVIC priority bits.
    pub nvic_prio_bits: Option<u32>,

    /// Whether the vendor supplies its own SysTick configuration.
    pub vendor_systick_config: Option<bool>,
}

/// A distinct hardware block mapped to a base address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Peripheral {
    /// The instance name of the peripheral (e.g., "USART1").
    pub name: String,

    /// The functional group the peripheral belongs to (e.g., "USART").
    pub group_name: String,

    /// Free-text description. Empty when the SVD omits it.
    pub description: String,

    /// Absolute base address in the memory map.
    pub base_address: Option<u32>,

    /// Address block metadata. Carried for completeness, never emitted.
    pub address_block: Option<AddressBlock>,

    /// Registers in document order.
    pub registers: Vec<Register>,
}

impl Peripheral {
    /// A peripheral can be rendered iff it has a name and a base address.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && self.base_address.is_some()
    }
}

/// The address range a peripheral occupies (SVD `addressBlock`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressBlock {
    /// Offset of the block from the peripheral base address.
    pub offset: Option<u32>,

    /// Size of the block in address units.
    pub size: Option<u32>,

    /// Usage kind as lowercase text ("registers", "buffer", "reserved").
    pub usage: String,
}

/// A 32-bit storage unit within a peripheral.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Register {
    /// Name of the peripheral this register belongs to (value copy).
    pub periph_containing: String,

    /// Register name (e.g., "CR1").
    pub name: String,

    /// Display name, when the SVD provides one distinct from `name`.
    pub display_name: String,

    /// Free-text description. Empty when the SVD omits it.
    pub description: String,

    /// Offset from the peripheral base address.
    pub address_offset: Option<u32>,

    /// Register width in bits. The emitter only lays out 32-bit registers.
    pub size: u32,

    /// Value of the register after reset.
    pub reset_value: u32,

    /// Bit-fields, in whatever order the loader produced them. The emitter
    /// sorts them by bit offset before rendering.
    pub fields: Vec<Field>,

    /// Access permission for the whole register. Metadata only.
    pub access: Access,
}

impl Default for Register {
    fn default() -> Self {
        Register {
            periph_containing: String::new(),
            name: String::new(),
            display_name: String::new(),
            description: String::new(),
            address_offset: None,
            size: 32,
            reset_value: 0,
            fields: Vec::new(),
            access: Access::default(),
        }
    }
}

impl Register {
    /// A register can be rendered iff it has a name and an address offset.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && self.address_offset.is_some()
    }

    /// Verifies the field-layout invariant: every field's bit range must lie
    /// inside `[0, 32)` and ranges must be pairwise disjoint. Fields missing
    /// an offset or width are skipped here; the emitter degrades on those
    /// with an inline diagnostic instead.
    pub fn check_layout(&self) -> Result<(), LayoutError> {
        let mut ranges: Vec<(u32, u32, &str)> = Vec::new();
        for field in &self.fields {
            let (Some(offset), Some(width)) = (field.bit_offset, field.bit_width) else {
                continue;
            };
            if width == 0 || offset >= 32 || offset + width > 32 {
                return Err(LayoutError::OutOfRange {
                    register: self.name.clone(),
                    field: field.name.clone(),
                    bit_offset: offset,
                    bit_width: width,
                });
            }
            ranges.push((offset, width, &field.name));
        }
        ranges.sort_by_key(|r| r.0);
        for pair in ranges.windows(2) {
            let (offset, width, name) = pair[0];
            let (next_offset, _, next_name) = pair[1];
            if offset + width > next_offset {
                return Err(LayoutError::Overlap {
                    register: self.name.clone(),
                    first: name.to_string(),
                    second: next_name.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A named bit-range within a register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    /// Name of the peripheral the containing register belongs to (value copy).
    pub periph: String,

    /// Name of the containing register (value copy).
    pub register: String,

    /// The containing register's reset value, duplicated for locality so a
    /// field can compute its own reset slice without walking upward.
    pub register_reset_value: u32,

    /// Field name (e.g., "TXE").
    pub name: String,

    /// Free-text description. Empty when the SVD omits it.
    pub description: String,

    /// Bit position of the least significant bit.
    pub bit_offset: Option<u32>,

    /// Width of the field in bits.
    pub bit_width: Option<u32>,

    /// Access permission. Metadata only.
    pub access: Access,
}

impl Default for Field {
    fn default() -> Self {
        Field {
            periph: String::new(),
            register: String::new(),
            register_reset_value: 0,
            name: String::new(),
            description: String::new(),
            bit_offset: None,
            bit_width: None,
            access: Access::default(),
        }
    }
}

impl Field {
    /// A field can be rendered iff it has a name, a bit offset and a width.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && self.bit_offset.is_some() && self.bit_width.is_some()
    }
}

/// An interrupt line routed to the NVIC.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Interrupt {
    /// Interrupt name (e.g., "USART1").
    pub name: String,

    /// Free-text description. Empty when the SVD omits it.
    pub description: String,

    /// Vector number. Entries without a number are skipped at emission.
    pub value: Option<u32>,
}

/// How software may access a register or field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    /// Read-only. Writes are ignored or fault.
    ReadOnly,
    /// Write-only. Reads return undefined values.
    WriteOnly,
    /// Read and write allowed.
    #[default]
    ReadWrite,
}

/// Violation of the register field-layout invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    /// A field's bit range falls outside the 32-bit register.
    #[error("field {field} in register {register} spans {bit_width} bits at offset {bit_offset}, outside the 32-bit register")]
    OutOfRange {
        /// Containing register name.
        register: String,
        /// Offending field name.
        field: String,
        /// The field's LSB position.
        bit_offset: u32,
        /// The field's width in bits.
        bit_width: u32,
    },

    /// Two fields claim the same bit.
    #[error("fields {first} and {second} in register {register} overlap")]
    Overlap {
        /// Containing register name.
        register: String,
        /// Lower of the two overlapping fields.
        first: String,
        /// Higher of the two overlapping fields.
        second: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, offset: u32, width: u32) -> Field {
        Field {
            name: name.to_string(),
            bit_offset: Some(offset),
            bit_width: Some(width),
            ..Default::default()
        }
    }

    #[test]
    fn register_defaults() {
        let reg = Register::default();
        assert_eq!(reg.size, 32);
        assert_eq!(reg.reset_value, 0);
        assert_eq!(reg.access, Access::ReadWrite);
        assert!(!reg.is_valid());
    }

    #[test]
    fn validity_requires_name_and_offset() {
        let mut reg = Register {
            name: "CR1".to_string(),
            ..Default::default()
        };
        assert!(!reg.is_valid());
        reg.address_offset = Some(0x4);
        assert!(reg.is_valid());

        let mut f = field("EN", 0, 1);
        assert!(f.is_valid());
        f.bit_width = None;
        assert!(!f.is_valid());
    }

    #[test]
    fn layout_accepts_disjoint_fields() {
        let reg = Register {
            name: "SR".to_string(),
            address_offset: Some(0),
            fields: vec![field("TC", 6, 1), field("TXE", 7, 1), field("DATA", 16, 16)],
            ..Default::default()
        };
        assert!(reg.check_layout().is_ok());
    }

    #[test]
    fn layout_rejects_overlap() {
        let reg = Register {
            name: "SR".to_string(),
            fields: vec![field("A", 4, 4), field("B", 6, 2)],
            ..Default::default()
        };
        assert_eq!(
            reg.check_layout(),
            Err(LayoutError::Overlap {
                register: "SR".to_string(),
                first: "A".to_string(),
                second: "B".to_string(),
            })
        );
    }

    #[test]
    fn layout_rejects_out_of_range() {
        let reg = Register {
            name: "SR".to_string(),
            fields: vec![field("HIGH", 30, 4)],
            ..Default::default()
        };
        assert!(matches!(
            reg.check_layout(),
            Err(LayoutError::OutOfRange { .. })
        ));
    }

    #[test]
    fn deep_clone_is_independent() {
        let original = Peripheral {
            name: "USART1".to_string(),
            base_address: Some(0x4001_3800),
            registers: vec![Register {
                periph_containing: "USART1".to_string(),
                name: "SR".to_string(),
                address_offset: Some(0),
                fields: vec![field("TC", 6, 1)],
                ..Default::default()
            }],
            ..Default::default()
        };

        let mut copy = original.clone();
        copy.name = "USART2".to_string();
        copy.registers[0].periph_containing = "USART2".to_string();
        copy.registers[0].fields[0].name = "DONE".to_string();

        assert_eq!(original.name, "USART1");
        assert_eq!(original.registers[0].periph_containing, "USART1");
        assert_eq!(original.registers[0].fields[0].name, "TC");
    }

    #[test]
    fn model_round_trips_through_json() {
        let mut device = Device {
            name: "TESTCHIP".to_string(),
            version: "1.2".to_string(),
            ..Default::default()
        };
        device.interrupts.insert(
            42,
            Interrupt {
                name: "USART1".to_string(),
                description: "usart".to_string(),
                value: Some(42),
            },
        );

        let json = serde_json::to_string(&device).unwrap();
        let back: Device = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "TESTCHIP");
        assert_eq!(back.interrupts[&42].name, "USART1");
    }
}
