use std::borrow::Cow;
/// Flat row-major buffer plus its shape.
///
/// Kernels borrow their inputs through views and hand back a view over the
/// caller-owned output buffer.
#[derive(Debug, Clone)]
pub struct TensorView<'a, T: Clone = f32> {
    pub data: Cow<'a, [T]>,
    pub shape: Cow<'a, [usize]>,
}
impl<'a, T: Clone> TensorView<'a, T> {
    pub fn new(data: &'a [T], shape: &'a [usize]) -> Self {
        let len: usize = shape.iter().product();
        assert_eq!(data.len(), len, "Data length mismatch");
        Self {
            data: Cow::Borrowed(data),
            shape: Cow::Borrowed(shape),
        }
    }
    pub fn from_owned(data: Vec<T>, shape: Vec<usize>) -> Self {
        let len: usize = shape.iter().product();
        assert_eq!(data.len(), len, "Data length mismatch");
        Self {
            data: Cow::Owned(data),
            shape: Cow::Owned(shape),
        }
    }
    pub fn from_slice(data: &'a [T], shape: Vec<usize>) -> Self {
        let len: usize = shape.iter().product();
        assert_eq!(data.len(), len, "Data length mismatch");
        Self {
            data: Cow::Borrowed(data),
            shape: Cow::Owned(shape),
        }
    }
    pub fn to_owned(&self) -> TensorView<'static, T> {
        TensorView::from_owned(self.data.to_vec(), self.shape.to_vec())
    }
    pub fn dim(&self) -> usize {
        self.shape.len()
    }
    pub fn size(&self, dim: usize) -> usize {
        self.shape[dim]
    }
    /// Element at a multi-dimensional index, row-major.
    pub fn at(&self, index: &[usize]) -> T {
        assert_eq!(index.len(), self.dim(), "Index rank mismatch");
        let offset = index
            .iter()
            .zip(self.shape.iter())
            .fold(0, |acc, (&i, &d)| {
                assert!(i < d, "Index {} out of bounds for dim of size {}", i, d);
                acc * d + i
            });
        self.data[offset].clone()
    }
}
