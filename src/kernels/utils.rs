use crate::kernels::numeric::Zero;
pub fn ensure_capacity<T: Zero>(v: &mut Vec<T>, len: usize) {
    if v.len() != len {
        v.clear();
        v.resize(len, T::ZERO);
    }
}
