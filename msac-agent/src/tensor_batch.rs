//! Replay-buffer storage backed by a candle tensor.
use candle_core::{Device, IndexOp, Tensor};
use msac_core::replay_buffer::BatchBase;

/// An observation or action batch stored as a single [`Tensor`].
///
/// The first dimension indexes transitions. Inside the replay buffer the
/// tensor is allocated lazily on the first push, once the per-transition
/// shape is known, and writes wrap around at the buffer capacity.
#[derive(Clone, Debug)]
pub struct TensorBatch {
    buf: Option<Tensor>,
    capacity: usize,
}

impl TensorBatch {
    /// Creates a batch from a tensor whose first dimension is the batch size.
    pub fn from_tensor(t: Tensor) -> Self {
        let capacity = t.dims()[0];
        Self {
            buf: Some(t),
            capacity,
        }
    }

}

impl BatchBase for TensorBatch {
    fn new(capacity: usize) -> Self {
        Self {
            buf: None,
            capacity,
        }
    }

    fn push(&mut self, index: usize, data: Self) {
        let data = match data.buf {
            Some(t) => t,
            None => return,
        };
        let n = data.dims()[0];
        if n == 0 {
            return;
        }

        let capacity = self.capacity;
        let buf = self.buf.get_or_insert_with(|| {
            let mut shape = data.dims().to_vec();
            shape[0] = capacity;
            Tensor::zeros(shape, data.dtype(), &Device::Cpu).unwrap()
        });

        if index + n > capacity {
            // wrap around at the end of the buffer
            let head = capacity - index;
            buf.slice_set(&data.i((..head,)).unwrap(), 0, index).unwrap();
            buf.slice_set(&data.i((head..,)).unwrap(), 0, 0).unwrap();
        } else {
            buf.slice_set(&data, 0, index).unwrap();
        }
    }

    fn sample(&self, ixs: &Vec<usize>) -> Self {
        let buf = self.buf.as_ref().expect("sampling from an empty TensorBatch");
        let ixs = {
            let ixs: Vec<u32> = ixs.iter().map(|&ix| ix as u32).collect();
            let len = ixs.len();
            Tensor::from_vec(ixs, (len,), buf.device()).unwrap()
        };
        let capacity = ixs.dims()[0];
        Self {
            buf: Some(buf.index_select(&ixs, 0).unwrap()),
            capacity,
        }
    }
}

impl From<TensorBatch> for Tensor {
    fn from(b: TensorBatch) -> Self {
        b.buf.unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(values: &[f32]) -> TensorBatch {
        let t = Tensor::from_slice(values, (values.len(), 1), &Device::Cpu).unwrap();
        TensorBatch::from_tensor(t)
    }

    fn values(b: &TensorBatch) -> Vec<f32> {
        b.buf
            .as_ref()
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap()
    }

    #[test]
    fn test_push_wraps_around() {
        let mut buffer = TensorBatch::new(4);
        buffer.push(0, batch(&[1.0, 2.0, 3.0, 4.0]));
        buffer.push(3, batch(&[5.0, 6.0]));

        // the write at index 3 spills over into index 0
        assert_eq!(values(&buffer), vec![6.0, 2.0, 3.0, 5.0]);
    }

    #[test]
    fn test_sample_selects_rows() {
        let mut buffer = TensorBatch::new(4);
        buffer.push(0, batch(&[1.0, 2.0, 3.0, 4.0]));

        let sampled = buffer.sample(&vec![2, 0, 2]);
        assert_eq!(values(&sampled), vec![3.0, 1.0, 3.0]);
    }
}
