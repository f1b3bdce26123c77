//! 实验结果.

use crate::profile::Profile;
use std::io::{self, Write};
use utils::series::DriftingPair;

/// 将 `profile` 的结果写进 `w` 中.
fn describe_into<W: Write>(
    name: &str,
    p: &Profile,
    series: Option<&DriftingPair>,
    w: &mut W,
) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.1}"),
            None => "/".to_string(),
        }
    }

    #[inline]
    fn count_to_display(u: Option<usize>) -> String {
        match u {
            Some(u) => u.to_string(),
            None => "x".to_string(),
        }
    }

    writeln!(w, "Profile `{name}`:")?;
    writeln!(w, "{S4}Spots per frame (nearest spot distance):")?;
    for (t, (n, d)) in p.per_frame().iter().zip(p.nearest()).enumerate() {
        let (n, d) = (count_to_display(*n), f64_to_display(*d));
        match series {
            Some(s) => writeln!(
                w,
                "{S4}{S4}frame {t:>2} (center distance {:>2}): {n} ({d})",
                s.center_distance(t),
            )?,
            None => writeln!(w, "{S4}{S4}frame {t:>2}: {n} ({d})")?,
        }
    }
    let q = p.quality();
    writeln!(
        w,
        "{S4}Quality: {} whole, {} split, {} degenerate",
        q.whole, q.split, q.degenerate
    )?;
    writeln!(w, "{S4}Failed frames: {}", p.failed())?;
    writeln!(
        w,
        "{S4}Average segmentation time: {} us",
        f64_to_display(p.avg_segment_time_us())
    )?;
    writeln!(w, "{S4}Total machine time: {} us", p.real_time_us())?;
    let t = p.most_time_consuming().map(|d| d.as_micros() as f64);
    write!(w, "{S4}Most time-consuming frame costs {} us", f64_to_display(t))?;
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<(&'static str, Profile)>,
    series: Option<DriftingPair>,
}

impl AblationResult {
    pub fn from_iter<I: IntoIterator<Item = (&'static str, Profile)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
            series: None,
        }
    }

    /// 附上序列参数, 报告中会显示每帧的球心距离.
    #[inline]
    pub fn with_series(mut self, series: DriftingPair) -> Self {
        self.series = Some(series);
        self
    }

    /// 分析运行结果, 写到标准输出.
    pub fn analyze(&self) -> io::Result<()> {
        let mut out = io::stdout().lock();
        utils::sep_to(&mut out)?;

        for (key, profile) in self.data.iter() {
            describe_into(key, profile, self.series.as_ref(), &mut out)?;
            writeln!(out)?;
            utils::sep_to(&mut out)?;
        }
        Ok(())
    }
}
