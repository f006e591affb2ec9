//! Statistics over synthesized streams.

use std::fmt::Write;

/// Summary of one stream over an alphabet of `symbol_count` symbols
#[derive(Debug, Clone, PartialEq)]
pub struct StreamStats {
    pub len: usize,
    pub symbol_count: u16,
    pub histogram: Vec<u64>,
    /// Shannon entropy in bits per symbol
    pub entropy: f64,
    pub chi_square: f64,
    pub p_value: f64,
    /// Symbol and length of the longest run of equal symbols
    pub longest_run: (u8, usize),
    pub serial_correlation: f64,
}

impl StreamStats {
    pub fn analyze(stream: &[u8], symbol_count: u16) -> Self {
        let histogram = histogram(stream, symbol_count);
        let chi_square = chi_square(&histogram, stream.len());
        Self {
            len: stream.len(),
            symbol_count,
            entropy: entropy(&histogram, stream.len()),
            chi_square,
            p_value: chi_square_p_value(chi_square, usize::from(symbol_count).saturating_sub(1)),
            longest_run: longest_run(stream),
            serial_correlation: serial_correlation(stream),
            histogram,
        }
    }

    /// Entropy of a uniform source over the alphabet
    pub fn max_entropy(&self) -> f64 {
        f64::from(self.symbol_count).log2()
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Symbols analyzed: {}", self.len);
        let _ = writeln!(out, "Alphabet size:    {}", self.symbol_count);
        let _ = writeln!(
            out,
            "Entropy:          {:.4} / {:.4} bits per symbol",
            self.entropy,
            self.max_entropy()
        );
        let _ = writeln!(
            out,
            "Chi-square:       {:.2} (p = {}) {}",
            self.chi_square,
            format_p_value(self.p_value),
            interpret_chi_square(self.p_value)
        );
        let _ = writeln!(
            out,
            "Longest run:      {} x symbol {}",
            self.longest_run.1, self.longest_run.0
        );
        let _ = writeln!(out, "Serial corr.:     {:.4}", self.serial_correlation);

        if self.symbol_count <= 16 && self.len > 0 {
            out.push_str("\nHistogram:\n");
            let peak = self.histogram.iter().copied().max().unwrap_or(1).max(1);
            for (symbol, &count) in self.histogram.iter().enumerate() {
                let bar = "#".repeat((count * 40 / peak) as usize);
                let _ = writeln!(out, "  {:>3} {:>8} {}", symbol, count, bar);
            }
        }
        out
    }
}

/// Counts per symbol; symbols at or above `symbol_count` are ignored
pub fn histogram(stream: &[u8], symbol_count: u16) -> Vec<u64> {
    let mut freq = vec![0u64; usize::from(symbol_count)];
    for &symbol in stream {
        if let Some(slot) = freq.get_mut(symbol as usize) {
            *slot += 1;
        }
    }
    freq
}

fn entropy(histogram: &[u64], len: usize) -> f64 {
    if len == 0 {
        return 0.0;
    }
    let len = len as f64;
    let mut entropy = 0.0;
    for &count in histogram {
        if count > 0 {
            let p = count as f64 / len;
            entropy -= p * p.log2();
        }
    }
    entropy
}

/// Chi-square goodness of fit against the uniform distribution
fn chi_square(histogram: &[u64], len: usize) -> f64 {
    if len == 0 || histogram.is_empty() {
        return 0.0;
    }
    let expected = len as f64 / histogram.len() as f64;
    histogram
        .iter()
        .map(|&count| {
            let diff = count as f64 - expected;
            diff * diff / expected
        })
        .sum()
}

/// Approximate p-value for chi-square (normal approximation)
fn chi_square_p_value(chi_square: f64, df: usize) -> f64 {
    if df == 0 {
        return 1.0;
    }
    let z = (2.0 * chi_square).sqrt() - (2.0 * df as f64 - 1.0).sqrt();
    0.5 * (1.0 - erf(z / std::f64::consts::SQRT_2))
}

fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();
    sign * y
}

fn interpret_chi_square(p: f64) -> &'static str {
    if !(0.01..=0.99).contains(&p) {
        "(significant deviation from uniform)"
    } else if !(0.05..=0.95).contains(&p) {
        "(slight deviation from uniform)"
    } else {
        "(consistent with uniform)"
    }
}

fn format_p_value(p: f64) -> String {
    if p < 0.0001 {
        "<0.0001".to_string()
    } else {
        format!("{:.4}", p)
    }
}

fn longest_run(stream: &[u8]) -> (u8, usize) {
    let Some(&first) = stream.first() else {
        return (0, 0);
    };
    let mut best = (first, 1);
    let mut current = (first, 1);
    for &symbol in &stream[1..] {
        if symbol == current.0 {
            current.1 += 1;
        } else {
            current = (symbol, 1);
        }
        if current.1 > best.1 {
            best = current;
        }
    }
    best
}

fn serial_correlation(data: &[u8]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }

    let mut sum = 0f64;
    let mut sum_sq = 0f64;
    let mut sum_prod = 0f64;

    for pair in data.windows(2) {
        let x = pair[0] as f64;
        let y = pair[1] as f64;
        sum += x;
        sum_sq += x * x;
        sum_prod += x * y;
    }

    let n = (data.len() - 1) as f64;
    let numerator = n * sum_prod - sum * sum;
    let denominator = n * sum_sq - sum * sum;

    if denominator.abs() < f64::EPSILON {
        0.0
    } else {
        numerator / denominator
    }
}

/// Fraction of equal positions over the common prefix of two streams
pub fn compare_streams(a: &[u8], b: &[u8]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let equal = a.iter().zip(b).filter(|(x, y)| x == y).count();
    equal as f64 / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_stream() {
        let stream: Vec<u8> = (0..1000).map(|i| (i % 10) as u8).collect();
        let stats = StreamStats::analyze(&stream, 10);

        assert_eq!(stats.histogram, vec![100; 10]);
        assert!((stats.entropy - 10f64.log2()).abs() < 1e-9);
        assert_eq!(stats.chi_square, 0.0);
        assert_eq!(stats.longest_run.1, 1);
    }

    #[test]
    fn test_constant_stream() {
        let stream = vec![7u8; 50];
        let stats = StreamStats::analyze(&stream, 10);

        assert_eq!(stats.entropy, 0.0);
        assert_eq!(stats.longest_run, (7, 50));
        assert!(stats.chi_square > 400.0);
        assert!(stats.p_value < 0.01);
    }

    #[test]
    fn test_longest_run_picks_first_longest() {
        assert_eq!(longest_run(&[1, 2, 2, 3, 3, 4]), (2, 2));
        assert_eq!(longest_run(&[5, 0, 0, 0, 9, 9]), (0, 3));
        assert_eq!(longest_run(&[]), (0, 0));
    }

    #[test]
    fn test_histogram_ignores_foreign_symbols() {
        assert_eq!(histogram(&[0, 1, 1, 12], 3), vec![1, 2, 0]);
    }

    #[test]
    fn test_compare_streams() {
        assert_eq!(compare_streams(&[1, 2, 3, 4], &[1, 0, 3, 0]), 0.5);
        assert_eq!(compare_streams(&[1, 2, 3], &[1, 2, 3, 9, 9]), 1.0);
        assert_eq!(compare_streams(&[], &[1]), 0.0);
    }

    #[test]
    fn test_chi_square_p_value_tail() {
        // 21.666 is the 1% critical value at 9 degrees of freedom
        let p = chi_square_p_value(21.666, 9);
        assert!(p > 0.003 && p < 0.02, "p = {}", p);

        let centre = chi_square_p_value(8.5, 9);
        assert!((centre - 0.5).abs() < 0.05, "p = {}", centre);
        assert_eq!(chi_square_p_value(3.0, 0), 1.0);
    }

    #[test]
    fn test_report_lists_histogram() {
        let report = StreamStats::analyze(&[0, 1, 1, 2], 3).report();
        assert!(report.contains("Symbols analyzed: 4"));
        assert!(report.contains("Histogram:"));
    }
}
