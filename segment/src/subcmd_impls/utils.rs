use std::collections::BTreeSet;

/// 深度切片索引的上限（不含）。
const MAX_SLICE: usize = 4096;

pub fn ranges_to_indices(s: &str) -> Result<BTreeSet<usize>, &'static str> {
    // 从形如`75,90,100`或`10-12,40`的字符串中提取切片索引集合，不允许为空。
    const ERR: &str = "切片索引格式错误或越界";
    let mut set = BTreeSet::<usize>::new();
    for ranges in s.split(',') {
        let mut d_iter = ranges.trim().split('-');
        let d1: usize = d_iter.next().ok_or(ERR)?.parse().map_err(|_| ERR)?;
        if d1 >= MAX_SLICE {
            return Err(ERR);
        }
        if let Some(d2) = d_iter.next() {
            let d2: usize = d2.parse().map_err(|_| ERR)?;
            if !(d1..MAX_SLICE).contains(&d2) {
                return Err(ERR);
            }
            set.extend(d1..=d2);
            if d_iter.next().is_some() {
                return Err(ERR);
            }
        } else {
            set.insert(d1);
        }
    }
    if set.is_empty() {
        return Err(ERR);
    }
    Ok(set)
}

pub mod rgb {
    use image::Rgb;

    #[inline]
    pub fn black() -> Rgb<u8> {
        Rgb::from([0x00, 0x00, 0x00])
    }

    #[inline]
    pub fn gray(v: u8) -> Rgb<u8> {
        Rgb::from([v, v, v])
    }

    /// 类别颜色，取自viridis色图的四个等距采样点。
    pub fn class_color(class: u8) -> Rgb<u8> {
        match class {
            0 => Rgb::from([0x44, 0x01, 0x54]),
            1 => Rgb::from([0x31, 0x68, 0x8E]),
            2 => Rgb::from([0x35, 0xB7, 0x79]),
            3 => Rgb::from([0xFD, 0xE7, 0x25]),
            _ => Rgb::from([0xFF, 0xFF, 0xFF]),
        }
    }

    /// `alpha * top + (1 - alpha) * bottom`。
    pub fn blend(bottom: Rgb<u8>, top: Rgb<u8>, alpha: f32) -> Rgb<u8> {
        let mix = |b: u8, t: u8| (alpha * t as f32 + (1.0 - alpha) * b as f32).round() as u8;
        Rgb::from([
            mix(bottom.0[0], top.0[0]),
            mix(bottom.0[1], top.0[1]),
            mix(bottom.0[2], top.0[2]),
        ])
    }
}
