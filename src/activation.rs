use crate::linear_algebra::Value;

pub fn tanh(x: Value) -> Value {
    x.tanh()
}

/// Derivative of tanh, expressed in terms of the tanh output itself.
pub fn tanh_prime(z: Value) -> Value {
    1.0 - z * z
}
