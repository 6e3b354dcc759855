// RegWired - SVD Register Map Generator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Zig source emitter for the RegWired device model.
//!
//! One formatter per entity kind, walking the model top-down
//! (device -> cpu -> peripherals -> registers -> fields -> interrupt table)
//! and streaming raw `\n`-separated lines into any [`std::io::Write`] sink.
//! Output is deterministic: the same model always produces the same bytes.
//!
//! Each emitted register becomes a `packed struct` covering bits 0..31
//! exactly once. Bits not claimed by a named field are filled with
//! `_unused<start>` members, split so no filler crosses an 8-bit boundary.
//! The struct is then bound to its absolute address through the `Register(T)`
//! helper of the downstream Zig runtime library.
//!
//! Entities missing required attributes degrade to an inline
//! `// Not enough info ...` comment instead of failing; only sink I/O
//! errors propagate.

use regwired_model::{Cpu, Device, Field, Interrupt, Peripheral, Register};
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Extracts the bit slice `[start, start + width)` of a register reset
/// value. Computed in u64 so a full 32-bit slice does not overflow the mask.
pub fn reset_slice(start: u32, width: u32, reset_value: u32) -> u32 {
    let mask = (1u64 << width) - 1;
    ((u64::from(reset_value) >> start) & mask) as u32
}

fn text_or<'a>(text: &'a str, fallback: &'a str) -> &'a str {
    if text.is_empty() {
        fallback
    } else {
        text
    }
}

/// Streams Zig declarations for a device into a byte sink.
///
/// The emitter never mutates the model except for sorting each register's
/// fields by bit offset immediately before rendering it.
pub struct ZigEmitter<W> {
    out: W,
}

impl<W: Write> ZigEmitter<W> {
    /// Wraps a sink.
    pub fn new(out: W) -> Self {
        ZigEmitter { out }
    }

    /// Unwraps the sink, e.g. to flush a buffered writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Emits the whole device: identification constants, the CPU block,
    /// every peripheral in model order, then the interrupt table sorted by
    /// vector number.
    pub fn emit_device(&mut self, device: &mut Device) -> io::Result<()> {
        writeln!(
            self.out,
            "pub const device_name = \"{}\";",
            text_or(&device.name, "unknown")
        )?;
        writeln!(
            self.out,
            "pub const device_revision = \"{}\";",
            text_or(&device.version, "unknown")
        )?;
        writeln!(
            self.out,
            "pub const device_description = \"{}\";",
            text_or(&device.description, "unknown")
        )?;
        if let Some(cpu) = &device.cpu {
            self.emit_cpu(cpu)?;
        }
        for peripheral in &mut device.peripherals {
            self.emit_peripheral(peripheral)?;
        }
        self.emit_interrupt_table(&device.interrupts)
    }

    /// Emits the `cpu` namespace. Absent booleans render as `false`;
    /// `nvic_prio_bits` is only emitted when present.
    pub fn emit_cpu(&mut self, cpu: &Cpu) -> io::Result<()> {
        writeln!(self.out, "pub const cpu = struct {{")?;
        writeln!(
            self.out,
            "pub const name = \"{}\";",
            text_or(&cpu.name, "unknown")
        )?;
        writeln!(
            self.out,
            "pub const revision = \"{}\";",
            text_or(&cpu.revision, "unknown")
        )?;
        writeln!(
            self.out,
            "pub const endian = \"{}\";",
            text_or(&cpu.endian, "unknown")
        )?;
        writeln!(
            self.out,
            "pub const mpu_present = {};",
            cpu.mpu_present.unwrap_or(false)
        )?;
        writeln!(
            self.out,
            "pub const fpu_present = {};",
            cpu.fpu_present.unwrap_or(false)
        )?;
        writeln!(
            self.out,
            "pub const vendor_systick_config = {};",
            cpu.vendor_systick_config.unwrap_or(false)
        )?;
        if let Some(bits) = cpu.nvic_prio_bits {
            writeln!(self.out, "pub const nvic_prio_bits = {};", bits)?;
        }
        writeln!(self.out, "}};")
    }

    /// Emits one peripheral as a namespace with a `base_address` constant
    /// and every register in model order.
    pub fn emit_peripheral(&mut self, peripheral: &mut Peripheral) -> io::Result<()> {
        let Some(base_address) = peripheral.base_address else {
            return writeln!(self.out, "// Not enough info to print peripheral");
        };
        if peripheral.name.is_empty() {
            return writeln!(self.out, "// Not enough info to print peripheral");
        }
        writeln!(
            self.out,
            "/// {}",
            text_or(&peripheral.description, "No description")
        )?;
        writeln!(self.out, "pub const {} = struct {{", peripheral.name)?;
        writeln!(self.out, "const base_address = 0x{:x};", base_address)?;
        for register in &mut peripheral.registers {
            self.emit_register(register)?;
        }
        writeln!(self.out, "}};")
    }

    /// Emits one register: the `<NAME>_val` packed struct covering bits
    /// 0..31, then the `Register(T)` binding at `base_address + offset`.
    ///
    /// Fields are sorted by bit offset (absent offsets first, so they hit
    /// the incomplete-field escape before anything is half-rendered). Gaps
    /// between fields and after the last field are filled with `_unused`
    /// chunks so the packed struct always sums to 32 bits.
    pub fn emit_register(&mut self, register: &mut Register) -> io::Result<()> {
        let Some(address_offset) = register.address_offset else {
            return writeln!(self.out, "// Not enough info to print register value");
        };
        if register.name.is_empty() {
            return writeln!(self.out, "// Not enough info to print register value");
        }

        register.fields.sort_by_key(|f| f.bit_offset);

        writeln!(
            self.out,
            "/// {}",
            text_or(&register.display_name, &register.name)
        )?;
        writeln!(self.out, "pub const {}_val = packed struct {{", register.name)?;

        let mut cursor = 0u32;
        for field in &register.fields {
            let (Some(bit_offset), Some(bit_width)) = (field.bit_offset, field.bit_width) else {
                return writeln!(self.out, "// Not enough info to print register");
            };
            if bit_offset > cursor {
                self.emit_unused(cursor, bit_offset, register.reset_value)?;
            }
            self.emit_field(field)?;
            cursor = bit_offset + bit_width;
        }
        if cursor < 32 {
            self.emit_unused(cursor, 32, register.reset_value)?;
        }

        writeln!(self.out, "}};")?;
        writeln!(
            self.out,
            "/// {}",
            text_or(&register.description, "No description")
        )?;
        writeln!(
            self.out,
            "pub const {} = Register({}_val).init(base_address + 0x{:x});",
            register.name, register.name, address_offset
        )
    }

    /// Emits one named field as its three-line form: the bit-range comment,
    /// the description comment, and the member with its reset slice.
    pub fn emit_field(&mut self, field: &Field) -> io::Result<()> {
        let (Some(bit_offset), Some(bit_width)) = (field.bit_offset, field.bit_width) else {
            return writeln!(self.out, "// Not enough info to print field");
        };
        if field.name.is_empty() {
            return writeln!(self.out, "// Not enough info to print field");
        }
        writeln!(
            self.out,
            "/// {} [{}:{}]",
            field.name,
            bit_offset,
            bit_offset + bit_width - 1
        )?;
        writeln!(
            self.out,
            "/// {}",
            text_or(&field.description, "No description")
        )?;
        writeln!(
            self.out,
            "{}: u{} = {},",
            field.name,
            bit_width,
            reset_slice(bit_offset, bit_width, field.register_reset_value)
        )
    }

    // Fills the gap [first, last) with one comment and one filler member per
    // 8-bit-bounded chunk. Zig packed structs historically mis-laid-out wide
    // members crossing byte boundaries, hence the split.
    fn emit_unused(&mut self, first: u32, last: u32, reset_value: u32) -> io::Result<()> {
        writeln!(self.out, "/// unused [{}:{}]", first, last - 1)?;
        let mut start = first;
        while start < last {
            let end = last.min((start / 8 + 1) * 8);
            writeln!(
                self.out,
                "_unused{}: u{} = {},",
                start,
                end - start,
                reset_slice(start, end - start, reset_value)
            )?;
            start = end;
        }
        Ok(())
    }

    fn emit_interrupt_table(&mut self, interrupts: &BTreeMap<u32, Interrupt>) -> io::Result<()> {
        writeln!(self.out, "pub const interrupts = struct {{")?;
        for interrupt in interrupts.values() {
            let Some(value) = interrupt.value else {
                continue;
            };
            writeln!(self.out, "pub const {} = {};", interrupt.name, value)?;
        }
        writeln!(self.out, "}};")
    }
}
