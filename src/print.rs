//! Diagnostic hex dump shared by both stores.
//!
//! One line per 32 byte row: the address as 8 hex digits (or [`ELLIPSIS`]), `" | "`, then every
//! byte either as `" C "` for printable ASCII or as two hex digits followed by a space.

use core::fmt::{self, Write};

pub const LINE_LENGTH: usize = 32;

/// Printed in place of the address for a collapsed run of blank rows.
pub const ELLIPSIS: &str = "...     ";

pub(crate) fn is_blank(data: &[u8]) -> bool {
    data.iter().all(|&byte| byte == 0xFF)
}

pub(crate) fn write_line<W: Write>(out: &mut W, address: u32, data: &[u8]) -> fmt::Result {
    write!(out, "{address:08X} | ")?;
    write_data(out, data)
}

pub(crate) fn write_ellipsis_line<W: Write>(out: &mut W, data: &[u8]) -> fmt::Result {
    write!(out, "{ELLIPSIS} | ")?;
    write_data(out, data)
}

fn write_data<W: Write>(out: &mut W, data: &[u8]) -> fmt::Result {
    for &byte in data {
        if (0x20..=0x7E).contains(&byte) {
            write!(out, " {} ", byte as char)?;
        } else {
            write!(out, "{byte:02X} ")?;
        }
    }
    out.write_char('\n')
}
