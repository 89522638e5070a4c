//! Inter-annotator agreement
//!
//! [`AnnotationTask`] computes Krippendorff's alpha, Cohen's kappa (averaged
//! over coder pairs), Scott's pi and Bennett, Albert & Goldstein's S over
//! `(coder, item, label)` triples. Ranking HITs feed it one triple per
//! translation of every decoded result.
//!
//! Every undefined quantity (zero denominator, too few coders, a coder pair
//! without a label for some item) is reported as [`DegenerateInputError`]
//! instead of producing NaN or infinity.

use crate::error::DegenerateInputError;
use crate::hit::HitSnapshot;
use crate::judgment::{DecodedValue, Judgment};
use crate::task_type::TaskType;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use tracing::debug;

type AgreementResult<T> = std::result::Result<T, DegenerateInputError>;

/// Distance between two labels, 0 for identical labels
pub type Distance = fn(i64, i64) -> f64;

/// 0 when equal, 1 otherwise
pub fn binary_distance(a: i64, b: i64) -> f64 {
    if a == b {
        0.0
    } else {
        1.0
    }
}

/// Squared difference
pub fn interval_distance(a: i64, b: i64) -> f64 {
    let d = (a - b) as f64;
    d * d
}

/// One coder's label for one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub coder: String,
    pub item: String,
    pub label: i64,
}

impl Annotation {
    pub fn new(coder: impl Into<String>, item: impl Into<String>, label: i64) -> Self {
        Self {
            coder: coder.into(),
            item: item.into(),
            label,
        }
    }
}

/// Artstein & Poesio (2007) line: `coder,item,label`
impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.coder, self.item, self.label)
    }
}

fn divide(numerator: f64, denominator: f64, what: &str) -> AgreementResult<f64> {
    if denominator.abs() < f64::EPSILON {
        return Err(DegenerateInputError::new(format!("zero denominator in {}", what)));
    }
    Ok(numerator / denominator)
}

/// A set of annotations with a distance metric
pub struct AnnotationTask {
    data: Vec<Annotation>,
    coders: BTreeSet<String>,
    items: BTreeSet<String>,
    labels: BTreeSet<i64>,
    /// First label each coder gave each item
    lookup: HashMap<(String, String), i64>,
    distance: Distance,
}

impl AnnotationTask {
    /// Build a task using [`binary_distance`]
    pub fn new(data: Vec<Annotation>) -> Self {
        Self::with_distance(data, binary_distance)
    }

    pub fn with_distance(data: Vec<Annotation>, distance: Distance) -> Self {
        let mut coders = BTreeSet::new();
        let mut items = BTreeSet::new();
        let mut labels = BTreeSet::new();
        let mut lookup = HashMap::new();

        for a in &data {
            coders.insert(a.coder.clone());
            items.insert(a.item.clone());
            labels.insert(a.label);
            lookup
                .entry((a.coder.clone(), a.item.clone()))
                .or_insert(a.label);
        }

        Self {
            data,
            coders,
            items,
            labels,
            lookup,
            distance,
        }
    }

    pub fn coders(&self) -> &BTreeSet<String> {
        &self.coders
    }

    pub fn items(&self) -> &BTreeSet<String> {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn label(&self, coder: &str, item: &str) -> AgreementResult<i64> {
        self.lookup
            .get(&(coder.to_string(), item.to_string()))
            .copied()
            .ok_or_else(|| {
                DegenerateInputError::new(format!("coder {} has no label for item {}", coder, item))
            })
    }

    /// Unordered coder pairs; fails with fewer than two coders
    fn coder_pairs(&self) -> AgreementResult<Vec<(&str, &str)>> {
        if self.coders.len() < 2 {
            return Err(DegenerateInputError::new(format!(
                "at least 2 coders required, found {}",
                self.coders.len()
            )));
        }
        let coders: Vec<&str> = self.coders.iter().map(String::as_str).collect();
        let mut pairs = Vec::new();
        for (i, a) in coders.iter().enumerate() {
            for b in &coders[i + 1..] {
                pairs.push((*a, *b));
            }
        }
        Ok(pairs)
    }

    fn pairwise_average<F>(&self, mut f: F) -> AgreementResult<f64>
    where
        F: FnMut(&str, &str) -> AgreementResult<f64>,
    {
        let pairs = self.coder_pairs()?;
        let mut total = 0.0;
        for &(a, b) in &pairs {
            total += f(a, b)?;
        }
        divide(total, pairs.len() as f64, "pairwise average")
    }

    /// Agreement of two coders on one item
    pub fn agr(&self, coder_a: &str, coder_b: &str, item: &str) -> AgreementResult<f64> {
        let a = self.label(coder_a, item)?;
        let b = self.label(coder_b, item)?;
        Ok(1.0 - (self.distance)(a, b))
    }

    /// Observed agreement of two coders over all items
    pub fn ao(&self, coder_a: &str, coder_b: &str) -> AgreementResult<f64> {
        let mut total = 0.0;
        for item in &self.items {
            total += self.agr(coder_a, coder_b, item)?;
        }
        divide(total, self.items.len() as f64, "observed agreement")
    }

    /// Observed agreement averaged over all coder pairs
    pub fn avg_ao(&self) -> AgreementResult<f64> {
        self.pairwise_average(|a, b| self.ao(a, b))
    }

    fn label_frequencies<'a>(annotations: impl Iterator<Item = &'a Annotation>) -> BTreeMap<i64, f64> {
        let mut freqs = BTreeMap::new();
        for a in annotations {
            *freqs.entry(a.label).or_insert(0.0) += 1.0;
        }
        freqs
    }

    fn weighted_disagreement(&self, freqs: &BTreeMap<i64, f64>) -> f64 {
        let mut total = 0.0;
        for (j, nj) in freqs {
            for (l, nl) in freqs {
                total += nj * nl * (self.distance)(*l, *j);
            }
        }
        total
    }

    /// Observed disagreement for alpha
    pub fn do_alpha(&self) -> AgreementResult<f64> {
        let mut by_item: BTreeMap<&str, Vec<&Annotation>> = BTreeMap::new();
        for a in &self.data {
            by_item.entry(a.item.as_str()).or_default().push(a);
        }

        let mut total = 0.0;
        for annotations in by_item.values() {
            let freqs = Self::label_frequencies(annotations.iter().copied());
            total += self.weighted_disagreement(&freqs);
        }

        let n_items = self.items.len() as f64;
        let n_coders = self.coders.len() as f64;
        divide(total, n_items * n_coders * (n_coders - 1.0), "alpha observed disagreement")
    }

    /// Krippendorff's alpha
    pub fn alpha(&self) -> AgreementResult<f64> {
        let freqs = Self::label_frequencies(self.data.iter());
        let n = self.items.len() as f64 * self.coders.len() as f64;
        let de = divide(self.weighted_disagreement(&freqs), n * (n - 1.0), "alpha expected disagreement")?;
        Ok(1.0 - divide(self.do_alpha()?, de, "alpha")?)
    }

    /// Expected agreement of two coders from their own label distributions
    pub fn ae_kappa(&self, coder_a: &str, coder_b: &str) -> AgreementResult<f64> {
        let n_items = self.items.len() as f64;
        let count = |coder: &str, label: i64| {
            self.data
                .iter()
                .filter(|a| a.coder == coder && a.label == label)
                .count() as f64
        };

        let mut ae = 0.0;
        for label in &self.labels {
            let pa = divide(count(coder_a, *label), n_items, "kappa expected agreement")?;
            let pb = divide(count(coder_b, *label), n_items, "kappa expected agreement")?;
            ae += pa * pb;
        }
        Ok(ae)
    }

    pub fn kappa_pairwise(&self, coder_a: &str, coder_b: &str) -> AgreementResult<f64> {
        let ae = self.ae_kappa(coder_a, coder_b)?;
        divide(self.ao(coder_a, coder_b)? - ae, 1.0 - ae, "kappa")
    }

    /// Cohen's kappa averaged over coder pairs
    pub fn kappa(&self) -> AgreementResult<f64> {
        self.pairwise_average(|a, b| self.kappa_pairwise(a, b))
    }

    /// Scott's pi, multi-coder form
    pub fn pi(&self) -> AgreementResult<f64> {
        let freqs = Self::label_frequencies(self.data.iter());
        let total: f64 = freqs.values().map(|n| n * n).sum();
        let n = self.items.len() as f64 * self.coders.len() as f64;
        let ae = divide(total, n * n, "pi expected agreement")?;
        divide(self.avg_ao()? - ae, 1.0 - ae, "pi")
    }

    /// Bennett, Albert & Goldstein's S
    pub fn s(&self) -> AgreementResult<f64> {
        let ae = divide(1.0, self.labels.len() as f64, "S expected agreement")?;
        divide(self.avg_ao()? - ae, 1.0 - ae, "S")
    }

    /// All four coefficients; fails if any of them is undefined
    pub fn scores(&self) -> AgreementResult<AgreementScores> {
        Ok(AgreementScores {
            alpha: self.alpha()?,
            kappa: self.kappa()?,
            pi: self.pi()?,
            s: self.s()?,
        })
    }
}

/// The four agreement coefficients of one HIT (or their average)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AgreementScores {
    pub alpha: f64,
    pub kappa: f64,
    pub pi: f64,
    pub s: f64,
}

/// `alpha,kappa,pi,S`
impl fmt::Display for AgreementScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.alpha, self.kappa, self.pi, self.s)
    }
}

/// Triples of a Ranking HIT: one per translation of every decoded result.
///
/// Item ids are `<segment id>.<translation index>`. Other task types yield
/// nothing; skipped and undecodable results are left out.
pub fn ranking_annotations(snapshot: &HitSnapshot) -> Vec<Annotation> {
    let hit = &snapshot.hit;
    if hit.task_type != TaskType::Ranking {
        debug!("HIT {} is not a ranking task, no annotations", hit.id);
        return Vec::new();
    }

    let mut annotations = Vec::new();
    for (segment, result) in snapshot.results_with_segments() {
        match result.judgment(TaskType::Ranking) {
            Judgment::Value(DecodedValue::Ranking(ranks)) => {
                for (index, rank) in ranks.into_iter().enumerate() {
                    annotations.push(Annotation::new(
                        result.user.clone(),
                        format!("{}.{}", segment.id, index),
                        rank,
                    ));
                }
            }
            Judgment::Skipped => {
                debug!("Skipped result {} of HIT {} has no ranks", result.id, hit.id);
            }
            Judgment::Failed(e) => {
                debug!("Cannot decode result {} of HIT {}: {}", result.id, hit.id, e);
            }
            Judgment::Value(_) => {}
        }
    }
    annotations
}

/// Agreement scores of one HIT
pub fn compute_agreement(snapshot: &HitSnapshot) -> AgreementResult<AgreementScores> {
    AnnotationTask::new(ranking_annotations(snapshot)).scores()
}

/// Per-HIT agreement scores and their unweighted average
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AgreementReport {
    /// `(hit id, scores)` for every HIT with defined scores, in input order
    pub rows: Vec<(String, AgreementScores)>,
    /// Zero when no HIT contributed
    pub average: AgreementScores,
}

impl AgreementReport {
    /// One `alpha,kappa,pi,S` line per contributing HIT, then the average line
    pub fn to_text(&self) -> String {
        self.rows
            .iter()
            .map(|(_, scores)| scores.to_string())
            .chain(std::iter::once(self.average.to_string()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Compute every HIT independently; degenerate HITs are left out
pub fn agreement_report<'a, I>(snapshots: I) -> AgreementReport
where
    I: IntoIterator<Item = &'a HitSnapshot>,
{
    let mut report = AgreementReport::default();
    let mut sum = AgreementScores::default();

    for snapshot in snapshots {
        match compute_agreement(snapshot) {
            Ok(scores) => {
                sum.alpha += scores.alpha;
                sum.kappa += scores.kappa;
                sum.pi += scores.pi;
                sum.s += scores.s;
                report.rows.push((snapshot.hit.id.clone(), scores));
            }
            Err(e) => debug!("No agreement for HIT {}: {}", snapshot.hit.id, e),
        }
    }

    let n = report.rows.len().max(1) as f64;
    report.average = AgreementScores {
        alpha: sum.alpha / n,
        kappa: sum.kappa / n,
        pi: sum.pi / n,
        s: sum.s / n,
    };
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(triples: &[(&str, &str, i64)]) -> AnnotationTask {
        AnnotationTask::new(
            triples
                .iter()
                .map(|(c, i, l)| Annotation::new(*c, *i, *l))
                .collect(),
        )
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
    }

    #[test]
    fn test_hand_computed_coefficients() {
        let t = task(&[("c1", "i1", 1), ("c1", "i2", 2), ("c2", "i1", 1), ("c2", "i2", 1)]);

        assert_close(t.avg_ao().unwrap(), 0.5);
        assert_close(t.alpha().unwrap(), 0.0);
        assert_close(t.kappa().unwrap(), 0.0);
        assert_close(t.pi().unwrap(), -1.0 / 3.0);
        assert_close(t.s().unwrap(), 0.0);
    }

    #[test]
    fn test_perfect_agreement() {
        let t = task(&[("c1", "i1", 1), ("c1", "i2", 2), ("c2", "i1", 1), ("c2", "i2", 2)]);
        let scores = t.scores().unwrap();

        assert_close(scores.alpha, 1.0);
        assert_close(scores.kappa, 1.0);
        assert_close(scores.pi, 1.0);
        assert_close(scores.s, 1.0);
    }

    #[test]
    fn test_single_coder_is_degenerate() {
        let t = task(&[("c1", "i1", 1), ("c1", "i2", 2)]);
        assert!(t.kappa().is_err());
        assert!(t.pi().is_err());
        assert!(t.s().is_err());
        assert!(t.alpha().is_err());
    }

    #[test]
    fn test_single_label_is_degenerate() {
        let t = task(&[("c1", "i1", 1), ("c2", "i1", 1)]);
        assert!(t.s().is_err());
        assert!(t.pi().is_err());
        assert!(t.scores().is_err());
    }

    #[test]
    fn test_missing_label_is_degenerate() {
        let t = task(&[("c1", "i1", 1), ("c1", "i2", 2), ("c2", "i1", 1)]);
        let err = t.avg_ao().unwrap_err();
        assert!(err.reason().contains("c2"));
    }

    #[test]
    fn test_empty_task_is_degenerate() {
        assert!(task(&[]).scores().is_err());
    }

    #[test]
    fn test_interval_distance_alpha() {
        let data = vec![
            Annotation::new("c1", "i1", 1),
            Annotation::new("c1", "i2", 3),
            Annotation::new("c2", "i1", 1),
            Annotation::new("c2", "i2", 3),
        ];
        let t = AnnotationTask::with_distance(data, interval_distance);
        assert_close(t.alpha().unwrap(), 1.0);
        assert_eq!(interval_distance(1, 3), 4.0);
    }

    #[test]
    fn test_three_coders_pairwise() {
        let t = task(&[
            ("a", "i1", 1),
            ("a", "i2", 2),
            ("b", "i1", 1),
            ("b", "i2", 2),
            ("c", "i1", 1),
            ("c", "i2", 1),
        ]);
        // pairs: (a,b) 1.0, (a,c) 0.5, (b,c) 0.5
        assert_close(t.avg_ao().unwrap(), 2.0 / 3.0);
    }

    #[test]
    fn test_annotation_apf_line() {
        assert_eq!(Annotation::new("alice", "12.3", 4).to_string(), "alice,12.3,4");
    }

    #[test]
    fn test_empty_report_averages_to_zero() {
        let report = agreement_report(std::iter::empty());
        assert!(report.rows.is_empty());
        assert_eq!(report.to_text(), "0,0,0,0");
    }
}
