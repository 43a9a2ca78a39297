// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::time::Instant;

use tracing::Span;

/// A single call's tracing span plus the wall-clock start used to fill
/// in `duration_us` at `finish`. Opens a `polycall.call` span so an
/// embedder with a `tracing` subscriber gets per-call observability
/// without the core having to know anything about where spans go.
pub struct CallTrace {
    span: Span,
    start: Instant,
    _entered: tracing::span::EnteredSpan,
}

/// Begins tracing one dispatch (§4.5 "call tracing"). Drop the returned
/// `CallTrace` or call `finish` once the call completes.
pub fn trace_begin(function: &str, source_lang: &str, target_lang: &str) -> CallTrace {
    let span = tracing::info_span!(
        "polycall.call",
        function = function,
        source_lang = source_lang,
        target_lang = target_lang,
        cache_hit = tracing::field::Empty,
        duration_us = tracing::field::Empty,
    );
    let entered = span.clone().entered();
    CallTrace {
        span,
        start: Instant::now(),
        _entered: entered,
    }
}

impl CallTrace {
    /// Records the cache outcome and elapsed duration, then exits the
    /// span.
    pub fn finish(self, cache_hit: bool) {
        let elapsed = self.start.elapsed();
        self.span.record("cache_hit", cache_hit);
        self.span.record("duration_us", elapsed.as_micros() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_begin_and_finish_do_not_panic_without_a_subscriber() {
        let trace = trace_begin("square", "python", "native");
        trace.finish(true);
    }
}
