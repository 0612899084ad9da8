/*
    trs80emu: TRS-80 Z80 interpreter and cassette tape decoder.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! # The building blocks of the [Z80](crate::Z80) state.
mod flags;
mod parse;
mod registers;

pub use flags::*;
pub use parse::*;
pub use registers::*;
