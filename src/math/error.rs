// src/math/error.rs

use thiserror::Error;

/// 行列演算・数値計算のエラー
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("次元エラー: {op} ({lhs_rows}x{lhs_cols} と {rhs_rows}x{rhs_cols})")]
    Dimension {
        op: &'static str,
        lhs_rows: usize,
        lhs_cols: usize,
        rhs_rows: usize,
        rhs_cols: usize,
    },
    #[error("インデックス範囲外: ({row}, {col}) は {rows}x{cols} の範囲外です。")]
    IndexOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("ゼロ除算が発生しました。")]
    DivideByZero,
    #[error("特異行列のため逆行列を計算できません。")]
    SingularMatrix,
    #[error("行列が正定値ではありません。")]
    NotPositiveDefinite,
    #[error("{rows}x{cols} 行列のメモリを確保できません。")]
    Memory { rows: usize, cols: usize },
}

impl MathError {
    /// 2つの行列形状から次元エラーを生成する
    pub(crate) fn dimension(op: &'static str, lhs: (usize, usize), rhs: (usize, usize)) -> Self {
        MathError::Dimension {
            op,
            lhs_rows: lhs.0,
            lhs_cols: lhs.1,
            rhs_rows: rhs.0,
            rhs_cols: rhs.1,
        }
    }

    /// 次元エラー系かどうか
    pub fn is_dimension(&self) -> bool {
        matches!(self, MathError::Dimension { .. } | MathError::IndexOutOfRange { .. })
    }
}

pub type MathResult<T> = Result<T, MathError>;
