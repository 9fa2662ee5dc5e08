//! Pooling strategies reducing per-token hidden states to sentence vectors.

use std::str::FromStr;

use crate::error::EmbedError;

/// How a `[batch, seq, hidden]` model output collapses to `[batch, hidden]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    /// Model output is already `[batch, hidden]`; copy out.
    None,
    /// Mask-weighted token mean; rows with an all-zero mask pool to zero.
    Mean,
    /// First (CLS) token.
    Cls,
}

impl FromStr for Pooling {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "mean" => Ok(Self::Mean),
            "cls" => Ok(Self::Cls),
            other => Err(EmbedError::InitFailed(format!(
                "unknown pooling strategy '{other}'"
            ))),
        }
    }
}

/// Pool one batch row out of a flat `[batch, seq, hidden]` buffer.
///
/// `mask` is the row's attention mask (`seq` entries). For [`Pooling::None`]
/// the buffer is `[batch, hidden]` and `seq`/`mask` are ignored.
#[must_use]
pub fn pool_row(
    strategy: Pooling,
    hidden: &[f32],
    batch_idx: usize,
    seq: usize,
    dims: usize,
    mask: &[i64],
) -> Vec<f32> {
    match strategy {
        Pooling::None => {
            let base = batch_idx * dims;
            hidden[base..base + dims].to_vec()
        }
        Pooling::Cls => {
            let base = batch_idx * seq * dims;
            hidden[base..base + dims].to_vec()
        }
        Pooling::Mean => {
            let base = batch_idx * seq * dims;
            let mut out = vec![0.0_f32; dims];
            let mut count = 0.0_f32;
            for (s, &m) in mask.iter().enumerate().take(seq) {
                if m == 0 {
                    continue;
                }
                count += 1.0;
                let row = base + s * dims;
                for (o, h) in out.iter_mut().zip(&hidden[row..row + dims]) {
                    *o += h;
                }
            }
            if count > 0.0 {
                for o in &mut out {
                    *o /= count;
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_accepts_the_three_strategies() {
        assert_eq!("none".parse::<Pooling>().unwrap(), Pooling::None);
        assert_eq!("mean".parse::<Pooling>().unwrap(), Pooling::Mean);
        assert_eq!("cls".parse::<Pooling>().unwrap(), Pooling::Cls);
        assert!("max".parse::<Pooling>().is_err());
    }

    #[test]
    fn mean_pooling_respects_the_mask() {
        // batch=1, seq=3, hidden=2; third token is padding.
        let hidden = vec![1.0, 2.0, 3.0, 4.0, 100.0, 100.0];
        let mask = vec![1_i64, 1, 0];
        let out = pool_row(Pooling::Mean, &hidden, 0, 3, 2, &mask);
        assert_eq!(out, vec![2.0, 3.0]);
    }

    #[test]
    fn mean_pooling_with_zero_mask_is_zero() {
        let hidden = vec![1.0, 2.0, 3.0, 4.0];
        let mask = vec![0_i64, 0];
        let out = pool_row(Pooling::Mean, &hidden, 0, 2, 2, &mask);
        assert_eq!(out, vec![0.0, 0.0]);
    }

    #[test]
    fn cls_takes_the_first_token_of_the_right_row() {
        // batch=2, seq=2, hidden=2
        let hidden = vec![1.0, 2.0, 9.0, 9.0, 5.0, 6.0, 9.0, 9.0];
        let out = pool_row(Pooling::Cls, &hidden, 1, 2, 2, &[]);
        assert_eq!(out, vec![5.0, 6.0]);
    }

    #[test]
    fn none_reads_direct_sentence_embeddings() {
        // batch=2, hidden=3
        let hidden = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let out = pool_row(Pooling::None, &hidden, 1, 0, 3, &[]);
        assert_eq!(out, vec![4.0, 5.0, 6.0]);
    }
}
