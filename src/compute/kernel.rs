use crate::store::{BinaryOp, UnaryOp};

/// Applies a unary catalog function. IEEE semantics throughout: `log(0)` is `-inf`,
/// `log(-1)` is NaN, nothing here fails.
#[inline(always)]
pub fn apply_unary(op: UnaryOp, x: f64) -> f64 {
    match op {
        // TODO: implement factorial; document generators already round `!` operands to integers.
        UnaryOp::Identity => x,
        UnaryOp::Negate => -x,
        UnaryOp::Cos => x.cos(),
        UnaryOp::Sin => x.sin(),
        UnaryOp::Exp => x.exp(),
        UnaryOp::Log => x.ln(),
    }
}

/// Applies a binary catalog function, IEEE semantics as for `apply_unary`.
/// `max` and `min` keep their first operand unless the second strictly wins, so
/// a NaN on the left propagates and a NaN on the right is ignored.
#[inline(always)]
pub fn apply_binary(op: BinaryOp, l: f64, r: f64) -> f64 {
    match op {
        BinaryOp::Add => l + r,
        BinaryOp::Subtract => l - r,
        BinaryOp::Multiply => l * r,
        BinaryOp::Divide => l / r,
        BinaryOp::Max => if l < r { r } else { l },
        BinaryOp::Min => if r < l { r } else { l },
        BinaryOp::Power => l.powf(r),
    }
}
