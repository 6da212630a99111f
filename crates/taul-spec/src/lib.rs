//! The binary wire format for spec instruction streams (spec.md §6) plus
//! the string/charset literal escape vocabulary that the wire format's
//! `string`/`charset` operands are written in.
//!
//! This crate has no opinion on spec *semantics* — validity, scoping, and
//! rule resolution are `taul-compile`'s job. It only knows how to get a
//! [`taul_core::Spec`] to and from bytes, and how to decode the escape
//! syntax inside a `string`/`charset` operand's payload.

pub mod escape;
pub mod wire;

pub use escape::{
    EscapeError, decode_charset_literal, decode_string_literal, is_visible_ascii,
    validate_literal_visibility,
};
pub use wire::{WireError, decode, encode};
