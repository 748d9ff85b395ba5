use std::fmt;

/// MRI采集模态。顺序即模型训练时的通道顺序。
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Modality {
    /// T1平扫。
    T1n,
    /// T1增强。
    T1c,
    /// T2-FLAIR。
    T2f,
    /// T2加权。
    T2w,
}

impl Modality {
    /// 规范通道顺序。
    pub const ALL: [Modality; 4] = [Modality::T1n, Modality::T1c, Modality::T2f, Modality::T2w];

    /// 压缩包中识别该模态所用的文件名后缀。
    #[inline]
    pub fn suffix(self) -> &'static str {
        match self {
            Modality::T1n => "t1n.nii.gz",
            Modality::T1c => "t1c.nii.gz",
            Modality::T2f => "t2f.nii.gz",
            Modality::T2w => "t2w.nii.gz",
        }
    }

    /// 在组合体数据中的通道索引。
    #[inline]
    pub fn channel(self) -> usize {
        self as usize
    }

    /// 按后缀识别文件名对应的模态。
    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| name.ends_with(m.suffix()))
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Modality::T1n => "T1n",
            Modality::T1c => "T1c",
            Modality::T2f => "T2f",
            Modality::T2w => "T2w",
        };
        f.write_str(s)
    }
}
