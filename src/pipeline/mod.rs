//! Pipeline stages for page acquisition and PDF assembly.
//!
//! Each submodule implements exactly one step, so each can be tested with
//! nothing but its inputs: the fetcher against a scripted transport, the
//! validator against byte slices, the assembler against in-memory images.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ transport ──▶ fetch ──▶ validate ──▶ acquire ──▶ assemble ──▶ compress
//! (id/name)  (HTTP GET)   (retry)   (magic)     (loop+EOD)   (lopdf)     (JPEG)
//!                                      detect ──┘
//! ```
//!
//! 1. [`input`]: validate the document identity, build page and referer URLs
//! 2. [`transport`]: one GET per call; the only stage with network I/O
//! 3. [`fetch`]: per-attempt timeout, fixed-delay retry, politeness pause
//! 4. [`validate`]: PNG / JPEG signature check
//! 5. [`detect`]: consecutive-empty counter deciding where the document ends
//! 6. [`acquire`]: the page loop tying 3–5 together
//! 7. [`assemble`]: one image per PDF page, scaled to fit and centred
//! 8. [`compress`]: JPEG re-encode pass over the composed document

pub mod acquire;
pub mod assemble;
pub mod compress;
pub mod detect;
pub mod fetch;
pub mod input;
pub mod transport;
pub mod validate;
