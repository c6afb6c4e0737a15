// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Code-page text encoding for printer firmware.
//
// Thermal printers consume single-byte (or legacy multi-byte) code pages,
// not UTF-8. We delegate the lookup to `encoding_rs` via its WHATWG labels
// and keep a curated list of the pages receipt printers actually ship with.
// Characters with no mapping in the target page are substituted by the
// encoder (numeric reference), never dropped.

use encoding_rs::Encoding;
use tracing::debug;

use bonwerk_core::error::{BonwerkError, Result};

use crate::traits::CharsetService;

/// Labels accepted by [`CodePageEncoder::encode`], in display order.
const SUPPORTED_LABELS: &[&str] = &[
    "windows-1252",
    "windows-1251",
    "windows-1250",
    "ibm866",
    "koi8-r",
    "iso-8859-2",
    "iso-8859-7",
    "iso-8859-15",
    "gbk",
    "big5",
    "shift_jis",
    "euc-kr",
];

/// `encoding_rs`-backed implementation of [`CharsetService`].
pub struct CodePageEncoder;

impl CodePageEncoder {
    fn lookup(charset: &str) -> Option<&'static Encoding> {
        // Only labels on the curated list are accepted, even though
        // `for_label` would resolve more — firmware support is the limit.
        if !SUPPORTED_LABELS
            .iter()
            .any(|l| l.eq_ignore_ascii_case(charset))
        {
            return None;
        }
        Encoding::for_label(charset.as_bytes())
    }
}

impl CharsetService for CodePageEncoder {
    fn encode(&self, text: &str, charset: &str) -> Result<Vec<u8>> {
        let encoding = Self::lookup(charset)
            .ok_or_else(|| BonwerkError::UnsupportedCharset(charset.to_string()))?;

        let (bytes, _, had_replacements) = encoding.encode(text);
        if had_replacements {
            debug!(
                charset,
                "some characters had no mapping and were substituted"
            );
        }
        Ok(bytes.into_owned())
    }

    fn supported(&self) -> Vec<String> {
        SUPPORTED_LABELS.iter().map(|l| l.to_string()).collect()
    }
}
