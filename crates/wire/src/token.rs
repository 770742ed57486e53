// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Command Server Project

//! Token-framed pipe I/O: the newline-terminated, backslash-escaped
//! protocol used to talk to executor subprocesses over FIFOs.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Escape a single token for the wire: `\` -> `\\`, `\n` -> `\n` (literal
/// two-character escape).
pub fn escape(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for ch in token.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Decode one already-unescaped-boundary token body back to its literal
/// form. Forgiving: `\n` -> newline, `\<anything else>` -> that character
/// verbatim, and a trailing lone `\` is kept as a literal backslash.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Join `tokens` with `\n` and escape them, as `writer.write` emits in a
/// single framed call: each piece escaped, separators and the terminating
/// newline added unescaped.
fn encode_frame(tokens: &[&str]) -> Vec<u8> {
    let mut out = String::new();
    for token in tokens {
        out.push_str(&escape(token));
        out.push('\n');
    }
    out.into_bytes()
}

#[derive(Debug, thiserror::Error)]
pub enum TokenIoError {
    #[error("i/o error reading token stream: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads tokens from an async byte stream, buffering a partial token
/// across underlying reads.
pub struct TokenReader<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin> TokenReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, buf: Vec::new(), pos: 0, eof: false }
    }

    async fn fill(&mut self) -> Result<bool, TokenIoError> {
        if self.eof {
            return Ok(false);
        }
        let mut chunk = [0u8; 4096];
        let n = self.inner.read(&mut chunk).await?;
        if n == 0 {
            self.eof = true;
            return Ok(false);
        }
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(true)
    }

    /// Read one newline-terminated token, decoding its escapes. Returns an
    /// empty string once the stream is exhausted.
    pub async fn read_one(&mut self) -> Result<String, TokenIoError> {
        Ok(self.try_read_one().await?.unwrap_or_default())
    }

    /// Like [`read_one`](Self::read_one), but distinguishes a genuine
    /// end-of-stream (no token left to read at all) from an empty token
    /// that was actually terminated by a newline.
    async fn try_read_one(&mut self) -> Result<Option<String>, TokenIoError> {
        loop {
            if let Some(nl) = self.buf[self.pos..].iter().position(|&b| b == b'\n') {
                let end = self.pos + nl;
                let raw = String::from_utf8_lossy(&self.buf[self.pos..end]).into_owned();
                self.pos = end + 1;
                self.compact();
                return Ok(Some(unescape(&raw)));
            }
            if !self.fill().await? {
                if self.pos >= self.buf.len() {
                    self.compact();
                    return Ok(None);
                }
                let raw = String::from_utf8_lossy(&self.buf[self.pos..]).into_owned();
                self.pos = self.buf.len();
                self.compact();
                return Ok(Some(unescape(&raw)));
            }
        }
    }

    fn compact(&mut self) {
        if self.pos >= self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        } else if self.pos > 4096 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
    }

    /// Read one token and parse it as an integer. On parse failure returns
    /// the raw token text as `Err`.
    pub async fn read_int(&mut self) -> Result<Result<i64, String>, TokenIoError> {
        let raw = self.read_one().await?;
        Ok(raw.parse::<i64>().map_err(|_| raw))
    }

    /// Read up to `n` tokens; returns fewer than `n` if the stream ends
    /// first.
    pub async fn read_multi(&mut self, n: usize) -> Result<Vec<String>, TokenIoError> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            match self.try_read_one().await? {
                Some(token) => out.push(token),
                None => break,
            }
        }
        Ok(out)
    }
}

/// Writes whole token frames to an async byte sink. Stateless beyond the
/// backing handle.
pub struct TokenWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> TokenWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Write all `tokens`, each escaped, one `\n`-terminated line each, in
    /// a single underlying write call.
    pub async fn write(&mut self, tokens: &[&str]) -> Result<(), TokenIoError> {
        let frame = encode_frame(tokens);
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
