//! Evaluation metrics for the held-out split

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class precision/recall/F1 plus accuracy and averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Indexed by label (0 = legitimate, 1 = fraud)
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
    /// `[[tn, fp], [fn, tp]]`
    pub confusion: [[usize; 2]; 2],
}

impl ClassificationReport {
    pub fn new(y_true: &[u8], y_pred: &[u8]) -> Result<Self, ModelError> {
        if y_true.len() != y_pred.len() {
            return Err(ModelError::LabelCountMismatch {
                rows: y_true.len(),
                labels: y_pred.len(),
            });
        }

        let mut confusion = [[0usize; 2]; 2];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            if t > 1 {
                return Err(ModelError::InvalidLabel(t as f64));
            }
            if p > 1 {
                return Err(ModelError::InvalidLabel(p as f64));
            }
            confusion[t as usize][p as usize] += 1;
        }

        let classes = [0usize, 1].map(|c| {
            let other = 1 - c;
            let tp = confusion[c][c] as f64;
            let predicted = (confusion[c][c] + confusion[other][c]) as f64;
            let support = confusion[c][c] + confusion[c][other];

            let precision = safe_div(tp, predicted);
            let recall = safe_div(tp, support as f64);
            let f1 = safe_div(2.0 * precision * recall, precision + recall);

            ClassMetrics {
                precision,
                recall,
                f1,
                support,
            }
        });

        let total = y_true.len();
        let accuracy = safe_div((confusion[0][0] + confusion[1][1]) as f64, total as f64);

        let macro_avg = ClassMetrics {
            precision: (classes[0].precision + classes[1].precision) / 2.0,
            recall: (classes[0].recall + classes[1].recall) / 2.0,
            f1: (classes[0].f1 + classes[1].f1) / 2.0,
            support: total,
        };

        let weighted = |f: fn(&ClassMetrics) -> f64| {
            safe_div(
                classes.iter().map(|m| f(m) * m.support as f64).sum(),
                total as f64,
            )
        };
        let weighted_avg = ClassMetrics {
            precision: weighted(|m| m.precision),
            recall: weighted(|m| m.recall),
            f1: weighted(|m| m.f1),
            support: total,
        };

        Ok(Self {
            classes,
            accuracy,
            macro_avg,
            weighted_avg,
            confusion,
        })
    }

    pub fn total(&self) -> usize {
        self.macro_avg.support
    }
}

/// Zero when the denominator is zero
fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

const NAME_WIDTH: usize = 12;

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>w$}  {:>9} {:>9} {:>9} {:>9}",
            "",
            "precision",
            "recall",
            "f1-score",
            "support",
            w = NAME_WIDTH
        )?;
        writeln!(f)?;

        write_row(f, "0", &self.classes[0])?;
        write_row(f, "1", &self.classes[1])?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>w$}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.total(),
            w = NAME_WIDTH
        )?;
        write_row(f, "macro avg", &self.macro_avg)?;
        write_row(f, "weighted avg", &self.weighted_avg)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, name: &str, m: &ClassMetrics) -> fmt::Result {
    writeln!(
        f,
        "{:>w$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
        name,
        m.precision,
        m.recall,
        m.f1,
        m.support,
        w = NAME_WIDTH
    )
}

/// Area under the ROC curve via the rank-sum statistic (ties share ranks)
pub fn roc_auc_score(y_true: &[u8], scores: &[f64]) -> Result<f64, ModelError> {
    if y_true.len() != scores.len() {
        return Err(ModelError::LabelCountMismatch {
            rows: scores.len(),
            labels: y_true.len(),
        });
    }

    let n_pos = y_true.iter().filter(|&&l| l == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(ModelError::InvalidParams(
            "Only one class present in y_true. ROC AUC score is not defined in that case.".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; tied block [i, j] shares the mean rank
        let rank = (i + j) as f64 / 2.0 + 1.0;
        let positives_in_block = order[i..=j].iter().filter(|&&k| y_true[k] == 1).count();
        positive_rank_sum += rank * positives_in_block as f64;
        i = j + 1;
    }

    let n_pos_f = n_pos as f64;
    Ok((positive_rank_sum - n_pos_f * (n_pos_f + 1.0) / 2.0) / (n_pos_f * n_neg as f64))
}
