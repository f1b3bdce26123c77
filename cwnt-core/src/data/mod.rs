use std::ops::{Index, IndexMut};

use ndarray::{Array3, ArrayView, ArrayView2, ArrayView3, ArrayView4, ArrayViewMut, Axis, Ix3};
use num::ToPrimitive;

use crate::consts::keys;
use crate::error::{ConfigIssue, SegmentError, SegmentResult};
use crate::{Idx2d, Idx3d};

mod calibration;
mod label;
pub mod phantom;

pub use calibration::Calibration;
pub use label::{Blob, LabelGenerator, LabelVolume};

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for f32 {}
}

/// 可以作为流程输入的像素类型: `u8`, `u16` 或 `f32`.
///
/// 像素在进入流程时即被转换为 `f32`.
pub trait Pixel: Copy + Default + Send + Sync + ToPrimitive + sealed::Sealed {}

impl Pixel for u8 {}
impl Pixel for u16 {}
impl Pixel for f32 {}

/// 以可失败的方式申请一个全零 3D 缓冲区.
///
/// 申请失败时返回 `SegmentError::Resource`, `context` 标明申请者.
/// 元素个数溢出时字节数无法表示, 报告为 0.
pub(crate) fn try_zeros<T: Copy + Default>(
    (z, h, w): Idx3d,
    context: &'static str,
) -> SegmentResult<Array3<T>> {
    let len = z
        .checked_mul(h)
        .and_then(|v| v.checked_mul(w))
        .ok_or(SegmentError::Resource { context, bytes: 0 })?;
    let mut raw = Vec::new();
    raw.try_reserve_exact(len)
        .map_err(|_| SegmentError::Resource {
            context,
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    raw.resize(len, T::default());

    // 长度与形状一致, 不会失败.
    Array3::from_shape_vec((z, h, w), raw).map_err(|_| SegmentError::Resource { context, bytes: 0 })
}

/// 单通道, 单帧的 3D 浮点体数据及其物理标定.
///
/// 2D 图像以单切片 3D 体数据表示.
#[derive(Debug, Clone)]
pub struct VolumeBuffer {
    data: Array3<f32>,
    calibration: Calibration,
}

impl Index<Idx3d> for VolumeBuffer {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for VolumeBuffer {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl VolumeBuffer {
    /// 从 `(z, h, w)` 组织的像素视图创建体数据, 像素值被转换为 `f32`.
    pub fn from_pixels<T: Pixel>(pixels: ArrayView3<T>, calibration: Calibration) -> Self {
        Self {
            data: pixels.mapv(|p| p.to_f32().unwrap_or_default()),
            calibration,
        }
    }

    /// 从 `(h, w)` 组织的 2D 图像创建单切片体数据.
    pub fn from_image<T: Pixel>(pixels: ArrayView2<T>, calibration: Calibration) -> Self {
        Self::from_pixels(pixels.insert_axis(Axis(0)), calibration)
    }

    /// 从 `(c, z, h, w)` 组织的多通道数据中取出第 `channel` 个通道.
    ///
    /// 通道越界时返回配置错误.
    pub fn from_channel<T: Pixel>(
        stack: ArrayView4<T>,
        channel: usize,
        calibration: Calibration,
    ) -> SegmentResult<Self> {
        let channels = stack.len_of(Axis(0));
        if channel >= channels {
            return Err(ConfigIssue::OutOfRange {
                key: keys::TARGET_CHANNEL,
                value: channel as f64,
                constraint: "< number of channels",
            }
            .into());
        }
        Ok(Self::from_pixels(
            stack.index_axis(Axis(0), channel),
            calibration,
        ))
    }

    /// 直接包装已有的浮点数据.
    #[inline]
    pub fn from_array(data: Array3<f32>, calibration: Calibration) -> Self {
        Self { data, calibration }
    }

    /// 申请与 `self` 同形状, 同标定的全零体数据.
    pub(crate) fn try_zeros_like(&self, context: &'static str) -> SegmentResult<Self> {
        Ok(Self {
            data: try_zeros(self.shape(), context)?,
            calibration: self.calibration,
        })
    }

    /// 以可失败的方式复制 `self`.
    pub(crate) fn try_clone(&self, context: &'static str) -> SegmentResult<Self> {
        let mut out = self.try_zeros_like(context)?;
        out.data.assign(&self.data);
        Ok(out)
    }

    /// 获取数据形状 `(z, h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 获取水平切片形状 `(h, w)`.
    #[inline]
    pub fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取体素个数.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否不含任何体素?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 获取物理标定.
    #[inline]
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// 获取第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), z_index)
    }

    /// 获取能按升序迭代水平切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ArrayView2<'_, f32>> {
        self.data.axis_iter(Axis(0))
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut<'_, f32, Ix3> {
        self.data.view_mut()
    }

    /// 取出内部数据.
    #[inline]
    pub fn into_data(self) -> Array3<f32> {
        self.data
    }
}
