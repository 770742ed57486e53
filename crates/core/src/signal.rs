// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Command Server Project

//! Logical signals a caller may send to a job or a loading executor, and the
//! per-executor translation table that remaps them before delivery.

use std::collections::HashMap;

/// One of the logical signals callers are allowed to request. Kept as a
/// closed set (rather than a raw signal number) so translation tables and
/// the wire protocol stay simple and portable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Term,
    Int,
    Hup,
    Quit,
}

impl Signal {
    /// The POSIX signal number this logical signal names by default (absent
    /// any translation).
    pub const fn number(self) -> i32 {
        match self {
            Signal::Term => 15,
            Signal::Int => 2,
            Signal::Hup => 1,
            Signal::Quit => 3,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Signal::Term => "TERM",
            Signal::Int => "INT",
            Signal::Hup => "HUP",
            Signal::Quit => "QUIT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TERM" => Some(Signal::Term),
            "INT" => Some(Signal::Int),
            "HUP" => Some(Signal::Hup),
            "QUIT" => Some(Signal::Quit),
            _ => None,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static mapping from logical signal to the effective signal actually
/// delivered to a job's process. Signals absent from the map pass through
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SignalTranslator {
    mapping: HashMap<Signal, Signal>,
}

impl SignalTranslator {
    pub fn new(mapping: HashMap<Signal, Signal>) -> Self {
        Self { mapping }
    }

    /// Resolve the effective signal for a logical signal, following the
    /// translation table when present.
    pub fn translate(&self, logical: Signal) -> Signal {
        self.mapping.get(&logical).copied().unwrap_or(logical)
    }
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
