use anyhow::{Context, Result};
use ndarray::{ArrayD, IxDyn};

use super::DeviceContext;

/// [`TensorScope`] が所有するテンソルのハンドル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorId(usize);

/// 中間テンソルのアリーナ。[`DeviceContext::tidy`] が作る。
pub struct TensorScope<'d> {
    device: &'d DeviceContext,
    tensors: Vec<ArrayD<f32>>,
    bytes: usize,
}

impl<'d> TensorScope<'d> {
    pub(super) fn new(device: &'d DeviceContext) -> Self {
        Self {
            device,
            tensors: Vec::new(),
            bytes: 0,
        }
    }

    /// スコープが終わるまで `tensor` を所有する
    pub fn adopt(&mut self, tensor: ArrayD<f32>) -> TensorId {
        let bytes = tensor.len() * std::mem::size_of::<f32>();
        self.device.track(bytes);
        self.bytes += bytes;
        self.tensors.push(tensor);
        TensorId(self.tensors.len() - 1)
    }

    pub fn get(&self, id: TensorId) -> &ArrayD<f32> {
        &self.tensors[id.0]
    }

    /// 同じデータを `shape` に並べた新しいテンソル
    pub fn reshape(&mut self, id: TensorId, shape: &[usize]) -> Result<TensorId> {
        let source = self.get(id);
        let reshaped = source
            .to_shape(IxDyn(shape))
            .with_context(|| format!("cannot reshape {:?} into {:?}", source.shape(), shape))?
            .into_owned();
        Ok(self.adopt(reshaped))
    }

    /// これまでに確保したテンソル数
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

impl Drop for TensorScope<'_> {
    fn drop(&mut self) {
        self.tensors.clear();
        self.device.untrack(self.bytes);
    }
}
