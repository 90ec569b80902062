// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Response body rewriting on top of stream filters

mod builtin;
mod rewriter;

pub use builtin::{BodyCapture, BodyLogger, CapturedBody, RegexReplace};
pub use rewriter::{BodyRewriter, RewriteAction, RewriterChain};
