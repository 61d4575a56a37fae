// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator math. Callers guard minimum history before
// trusting the output.

pub mod ema;
