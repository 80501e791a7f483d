// src/math/matrix.rs

//! 密行列カーネル
//!
//! 行優先 (row-major) のフラットなバッファに `rows * cols` 個の要素を保持する
//! 2次元行列。カルマンフィルタの線形代数演算（積・転置・逆行列・コレスキー分解）
//! はすべてこの型を通して行う。
//!
//! 形状が合わない演算は `MathError::Dimension` を、ゼロ除算は
//! `MathError::DivideByZero` を、逆行列計算時のゼロピボットは
//! `MathError::SingularMatrix` を返す。

use std::fmt;
use std::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::math::error::{MathError, MathResult};

/// 行列式計算で「ゼロ」とみなす絶対値
const NEAR_ZERO: f64 = f64::EPSILON;

/// 密行列
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix::new(1, 1)
    }
}

impl Matrix {
    /// ゼロ行列を生成する
    pub fn new(rows: usize, cols: usize) -> Self {
        Matrix::filled(rows, cols, 0.0)
    }

    /// すべての要素を `value` で埋めた行列を生成する
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// メモリ確保の失敗を `MathError::Memory` として返す生成関数
    ///
    /// # 引数
    /// - `rows`: 行数
    /// - `cols`: 列数
    /// - `value`: 初期値
    ///
    /// # 戻り値
    /// - 生成した行列、または要素数のオーバーフロー・確保失敗時は `MathError::Memory`
    pub fn try_new(rows: usize, cols: usize, value: f64) -> MathResult<Self> {
        let len = rows
            .checked_mul(cols)
            .ok_or(MathError::Memory { rows, cols })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| MathError::Memory { rows, cols })?;
        data.resize(len, value);
        Ok(Matrix { rows, cols, data })
    }

    /// n×n 単位行列
    pub fn identity(n: usize) -> Self {
        let mut eye = Matrix::new(n, n);
        for idx in 0..n {
            eye.data[idx * n + idx] = 1.0;
        }
        eye
    }

    /// 行優先のベクタから行列を生成する
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> MathResult<Self> {
        if data.len() != rows * cols {
            return Err(MathError::dimension("from_vec", (rows, cols), (data.len(), 1)));
        }
        Ok(Matrix { rows, cols, data })
    }

    /// 行のスライスから行列を生成する（各行の長さは揃っている必要がある）
    pub fn from_rows(rows: &[&[f64]]) -> MathResult<Self> {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(MathError::dimension("from_rows", (rows.len(), cols), (1, row.len())));
            }
            data.extend_from_slice(row);
        }
        Ok(Matrix {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// 列ベクトル (n×1) を生成する
    pub fn column(values: &[f64]) -> Self {
        Matrix {
            rows: values.len(),
            cols: 1,
            data: values.to_vec(),
        }
    }

    /// 破壊的なリサイズ。既存の要素は破棄され `value` で埋められる。
    pub fn resize(&mut self, rows: usize, cols: usize, value: f64) {
        self.rows = rows;
        self.cols = cols;
        self.data = vec![value; rows * cols];
    }

    /// すべての要素に `value` を設定する
    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// 要素数
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// 行ベクトルまたは列ベクトルかどうか
    pub fn is_vector(&self) -> bool {
        self.rows == 1 || self.cols == 1
    }

    /// 行優先の要素スライス
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// 行優先の可変要素スライス（形状は変えられない）
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    fn check_index(&self, row: usize, col: usize) -> MathResult<usize> {
        if row >= self.rows || col >= self.cols {
            return Err(MathError::IndexOutOfRange {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(row * self.cols + col)
    }

    /// (row, col) の要素を取得する
    pub fn get(&self, row: usize, col: usize) -> MathResult<f64> {
        let idx = self.check_index(row, col)?;
        Ok(self.data[idx])
    }

    /// (row, col) の要素への可変参照
    pub fn get_mut(&mut self, row: usize, col: usize) -> MathResult<&mut f64> {
        let idx = self.check_index(row, col)?;
        Ok(&mut self.data[idx])
    }

    /// (row, col) に値を設定する
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> MathResult<()> {
        *self.get_mut(row, col)? = value;
        Ok(())
    }

    /// 線形インデックスでの要素取得（行・列ベクトル用）
    pub fn elem(&self, idx: usize) -> MathResult<f64> {
        self.data.get(idx).copied().ok_or(MathError::IndexOutOfRange {
            row: idx,
            col: 0,
            rows: self.data.len(),
            cols: 1,
        })
    }

    /// 線形インデックスでの要素設定
    pub fn set_elem(&mut self, idx: usize, value: f64) -> MathResult<()> {
        let len = self.data.len();
        let slot = self.data.get_mut(idx).ok_or(MathError::IndexOutOfRange {
            row: idx,
            col: 0,
            rows: len,
            cols: 1,
        })?;
        *slot = value;
        Ok(())
    }

    /// 指定行を 1×cols 行列として取り出す
    pub fn row(&self, row: usize) -> MathResult<Matrix> {
        let start = self.check_index(row, 0)?;
        Ok(Matrix {
            rows: 1,
            cols: self.cols,
            data: self.data[start..start + self.cols].to_vec(),
        })
    }

    /// 指定列を rows×1 行列として取り出す
    pub fn col(&self, col: usize) -> MathResult<Matrix> {
        self.check_index(0, col)?;
        let data = (0..self.rows).map(|r| self.data[r * self.cols + col]).collect();
        Ok(Matrix {
            rows: self.rows,
            cols: 1,
            data,
        })
    }

    fn check_same_shape(&self, rhs: &Matrix, op: &'static str) -> MathResult<()> {
        if self.shape() != rhs.shape() {
            return Err(MathError::dimension(op, self.shape(), rhs.shape()));
        }
        Ok(())
    }

    fn zip_with(&self, rhs: &Matrix, op: &'static str, f: impl Fn(f64, f64) -> f64) -> MathResult<Matrix> {
        self.check_same_shape(rhs, op)?;
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| f(*a, *b)).collect(),
        })
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|v| f(*v)).collect(),
        }
    }

    /// 行列和
    pub fn try_add(&self, rhs: &Matrix) -> MathResult<Matrix> {
        self.zip_with(rhs, "add", |a, b| a + b)
    }

    /// 行列差
    pub fn try_sub(&self, rhs: &Matrix) -> MathResult<Matrix> {
        self.zip_with(rhs, "sub", |a, b| a - b)
    }

    /// 要素ごとの積
    pub fn hadamard(&self, rhs: &Matrix) -> MathResult<Matrix> {
        self.zip_with(rhs, "hadamard", |a, b| a * b)
    }

    /// 要素ごとの商。除数にゼロが含まれる場合は `DivideByZero`。
    pub fn elem_div(&self, rhs: &Matrix) -> MathResult<Matrix> {
        self.check_same_shape(rhs, "elem_div")?;
        if rhs.data.iter().any(|v| *v == 0.0) {
            return Err(MathError::DivideByZero);
        }
        self.zip_with(rhs, "elem_div", |a, b| a / b)
    }

    /// 行列積。`self.cols == rhs.rows` が必要。
    pub fn matmul(&self, rhs: &Matrix) -> MathResult<Matrix> {
        if self.cols != rhs.rows {
            return Err(MathError::dimension("matmul", self.shape(), rhs.shape()));
        }
        let mut result = Matrix::new(self.rows, rhs.cols);
        for r in 0..self.rows {
            let lhs_row = &self.data[r * self.cols..(r + 1) * self.cols];
            for c in 0..rhs.cols {
                result.data[r * rhs.cols + c] = lhs_row
                    .iter()
                    .enumerate()
                    .map(|(k, a)| a * rhs.data[k * rhs.cols + c])
                    .sum();
            }
        }
        Ok(result)
    }

    pub fn try_add_assign(&mut self, rhs: &Matrix) -> MathResult<()> {
        self.check_same_shape(rhs, "add_assign")?;
        self.data.iter_mut().zip(&rhs.data).for_each(|(a, b)| *a += b);
        Ok(())
    }

    pub fn try_sub_assign(&mut self, rhs: &Matrix) -> MathResult<()> {
        self.check_same_shape(rhs, "sub_assign")?;
        self.data.iter_mut().zip(&rhs.data).for_each(|(a, b)| *a -= b);
        Ok(())
    }

    /// 要素ごとの積の代入
    ///
    /// 除数を持たないため、ゼロ要素があっても `DivideByZero` にはならない。
    pub fn try_hadamard_assign(&mut self, rhs: &Matrix) -> MathResult<()> {
        self.check_same_shape(rhs, "hadamard_assign")?;
        self.data.iter_mut().zip(&rhs.data).for_each(|(a, b)| *a *= b);
        Ok(())
    }

    /// 要素ごとの商の代入
    pub fn try_elem_div_assign(&mut self, rhs: &Matrix) -> MathResult<()> {
        self.check_same_shape(rhs, "elem_div_assign")?;
        if rhs.data.iter().any(|v| *v == 0.0) {
            return Err(MathError::DivideByZero);
        }
        self.data.iter_mut().zip(&rhs.data).for_each(|(a, b)| *a /= b);
        Ok(())
    }

    /// スカラーによる除算の代入
    pub fn try_div_assign_scalar(&mut self, rhs: f64) -> MathResult<()> {
        if rhs == 0.0 {
            return Err(MathError::DivideByZero);
        }
        self.data.iter_mut().for_each(|a| *a /= rhs);
        Ok(())
    }

    /// 転置行列
    pub fn transpose(&self) -> Matrix {
        let mut result = Matrix::new(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                result.data[c * self.rows + r] = self.data[r * self.cols + c];
            }
        }
        result
    }

    /// 内積。要素数が一致している必要がある（行・列ベクトルの向きは問わない）。
    pub fn dot(&self, rhs: &Matrix) -> MathResult<f64> {
        if self.len() != rhs.len() {
            return Err(MathError::dimension("dot", self.shape(), rhs.shape()));
        }
        Ok(self.data.iter().zip(&rhs.data).map(|(a, b)| a * b).sum())
    }

    /// 対称性の判定
    ///
    /// # 引数
    /// - `tol`: 許容誤差。`None` の場合はマシンイプシロン。
    ///
    /// # 戻り値
    /// - すべての i > j について |A[i][j] - A[j][i]| <= tol なら `true`。非正方行列は `false`。
    pub fn is_symmetric(&self, tol: Option<f64>) -> bool {
        if !self.is_square() {
            return false;
        }
        let tol = tol.unwrap_or(f64::EPSILON);
        (0..self.rows).all(|r| (0..r).all(|c| (self[(r, c)] - self[(c, r)]).abs() <= tol))
    }

    /// 対称部分 (A + Aᵗ) / 2 で自身を置き換える
    pub fn symmetrize(&mut self) -> MathResult<()> {
        if !self.is_square() {
            return Err(MathError::dimension("symmetrize", self.shape(), self.shape()));
        }
        for r in 0..self.rows {
            for c in 0..r {
                let avg = 0.5 * (self[(r, c)] + self[(c, r)]);
                self[(r, c)] = avg;
                self[(c, r)] = avg;
            }
        }
        Ok(())
    }

    /// 行列式
    ///
    /// 1×1, 2×2 は閉じた式で計算する。それ以上はゼロ要素が最も多い行（同数なら
    /// 先に見つかった行）を選び、その行に沿った余因子展開を再帰的に行う。
    /// すべてゼロの行があれば即座に 0 を返す。
    pub fn det(&self) -> MathResult<f64> {
        if !self.is_square() || self.rows == 0 {
            return Err(MathError::dimension("det", self.shape(), self.shape()));
        }
        let n = self.rows;
        match n {
            1 => return Ok(self.data[0]),
            2 => return Ok(self.data[0] * self.data[3] - self.data[1] * self.data[2]),
            _ => {}
        }

        let mut pivot_row = 0;
        let mut max_zeros = 0;
        for r in 0..n {
            let zeros = (0..n).filter(|c| self[(r, *c)].abs() <= NEAR_ZERO).count();
            if zeros == n {
                return Ok(0.0);
            }
            if zeros > max_zeros {
                pivot_row = r;
                max_zeros = zeros;
            }
        }

        let mut det = 0.0;
        for c in 0..n {
            let a = self[(pivot_row, c)];
            if a.abs() <= NEAR_ZERO {
                continue;
            }
            let sign = if (pivot_row + c) % 2 == 0 { 1.0 } else { -1.0 };
            det += sign * a * self.minor(pivot_row, c)?;
        }
        Ok(det)
    }

    /// 小行列式 M(row, col)：指定した行と列を除いた行列の行列式
    pub fn minor(&self, row: usize, col: usize) -> MathResult<f64> {
        if !self.is_square() || self.rows < 2 {
            return Err(MathError::dimension("minor", self.shape(), self.shape()));
        }
        self.check_index(row, col)?;
        let n = self.rows;
        let mut sub = Vec::with_capacity((n - 1) * (n - 1));
        for r in (0..n).filter(|r| *r != row) {
            for c in (0..n).filter(|c| *c != col) {
                sub.push(self[(r, c)]);
            }
        }
        Matrix::from_vec(n - 1, n - 1, sub)?.det()
    }

    /// 左上 k×k の主小行列
    fn leading_block(&self, k: usize) -> Matrix {
        let mut block = Matrix::new(k, k);
        for r in 0..k {
            for c in 0..k {
                block[(r, c)] = self[(r, c)];
            }
        }
        block
    }

    /// 正定値判定（すべての首座小行列式が正であること）
    pub fn is_pos_def(&self) -> MathResult<bool> {
        if !self.is_square() || self.rows == 0 {
            return Err(MathError::dimension("is_pos_def", self.shape(), self.shape()));
        }
        if !self.is_symmetric(None) {
            return Ok(false);
        }
        for k in 1..=self.rows {
            if self.leading_block(k).det()? <= 0.0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// コレスキー分解（上三角形式）A = UᵗU
    ///
    /// # 戻り値
    /// - `(U, true)`: 分解成功
    /// - `(ゼロ行列, false)`: 非対称、または対角成分の根号内が正でない（正定値でない）
    pub fn cholesky_utu(&self) -> MathResult<(Matrix, bool)> {
        if !self.is_square() {
            return Err(MathError::dimension("cholesky_utu", self.shape(), self.shape()));
        }
        let n = self.rows;
        let mut upper = Matrix::new(n, n);
        if !self.is_symmetric(None) {
            return Ok((upper, false));
        }
        for row in 0..n {
            for col in row..n {
                let sum: f64 = (0..row).map(|k| upper[(k, row)] * upper[(k, col)]).sum();
                if row == col {
                    let radicand = self[(row, row)] - sum;
                    if radicand <= 0.0 || radicand.is_nan() {
                        return Ok((Matrix::new(n, n), false));
                    }
                    upper[(row, row)] = radicand.sqrt();
                } else {
                    upper[(row, col)] = (self[(row, col)] - sum) / upper[(row, row)];
                }
            }
        }
        Ok((upper, true))
    }

    /// コレスキー分解（下三角形式）A = LLᵗ
    ///
    /// 失敗時の扱いは [`Matrix::cholesky_utu`] と同じ。
    pub fn cholesky_llt(&self) -> MathResult<(Matrix, bool)> {
        if !self.is_square() {
            return Err(MathError::dimension("cholesky_llt", self.shape(), self.shape()));
        }
        let n = self.rows;
        let mut lower = Matrix::new(n, n);
        if !self.is_symmetric(None) {
            return Ok((lower, false));
        }
        for row in 0..n {
            for col in 0..=row {
                let sum: f64 = (0..col).map(|k| lower[(row, k)] * lower[(col, k)]).sum();
                if row == col {
                    let radicand = self[(row, row)] - sum;
                    if radicand <= 0.0 || radicand.is_nan() {
                        return Ok((Matrix::new(n, n), false));
                    }
                    lower[(row, row)] = radicand.sqrt();
                } else {
                    lower[(row, col)] = (self[(row, col)] - sum) / lower[(col, col)];
                }
            }
        }
        Ok((lower, true))
    }

    /// 逆行列（スケール付きピボット選択のガウス消去法）
    ///
    /// 各行の最大絶対値（スケール）を先に求め、列 k ごとに未使用の行の中から
    /// |a[row][k]| / scale[row] が最大の行をピボットに選ぶ。行は物理的に入れ替えず、
    /// ピボット順を `order` に記録する。消去で使った乗数はゼロになった位置に保存し、
    /// 単位行列の各列を右辺とした前進代入・後退代入で逆行列の各列を求める。
    ///
    /// 参考: Cheney & Kincaid, "Numerical Mathematics and Computing"
    ///
    /// # 戻り値
    /// - 逆行列
    /// - 非正方行列は `Dimension`、ゼロピボット・ゼロスケールは `SingularMatrix`
    pub fn inverse(&self) -> MathResult<Matrix> {
        if !self.is_square() || self.rows == 0 {
            return Err(MathError::dimension("inverse", self.shape(), self.shape()));
        }
        let n = self.rows;
        let mut lu = self.data.clone();
        let mut order: Vec<usize> = (0..n).collect();
        let scale: Vec<f64> = (0..n)
            .map(|r| lu[r * n..(r + 1) * n].iter().fold(0.0_f64, |m, v| m.max(v.abs())))
            .collect();

        // 前進消去
        for k in 0..n.saturating_sub(1) {
            let mut ratio_max = 0.0;
            let mut best = k;
            for (i, &r) in order.iter().enumerate().skip(k) {
                if scale[r] == 0.0 {
                    return Err(MathError::SingularMatrix);
                }
                let ratio = (lu[r * n + k] / scale[r]).abs();
                if ratio > ratio_max {
                    ratio_max = ratio;
                    best = i;
                }
            }
            order.swap(k, best);

            let pivot = order[k];
            let pivot_val = lu[pivot * n + k];
            if pivot_val == 0.0 {
                return Err(MathError::SingularMatrix);
            }
            for &r in &order[k + 1..] {
                let factor = lu[r * n + k] / pivot_val;
                lu[r * n + k] = factor;
                for c in k + 1..n {
                    lu[r * n + c] -= factor * lu[pivot * n + c];
                }
            }
        }

        // 単位行列の各列について前進代入・後退代入
        let mut inv = Matrix::new(n, n);
        let mut rhs = vec![0.0; n];
        for e in 0..n {
            rhs.iter_mut().for_each(|v| *v = 0.0);
            rhs[e] = 1.0;

            for k in 0..n.saturating_sub(1) {
                let pivot = order[k];
                for &r in &order[k + 1..] {
                    rhs[r] -= lu[r * n + k] * rhs[pivot];
                }
            }

            for i in (0..n).rev() {
                let r = order[i];
                let mut sum = rhs[r];
                for c in i + 1..n {
                    sum -= lu[r * n + c] * inv.data[c * n + e];
                }
                let diag = lu[r * n + i];
                if diag == 0.0 {
                    return Err(MathError::SingularMatrix);
                }
                inv.data[i * n + e] = sum / diag;
            }
        }
        Ok(inv)
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        assert!(row < self.rows && col < self.cols, "matrix index out of range");
        &self.data[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        assert!(row < self.rows && col < self.cols, "matrix index out of range");
        &mut self.data[row * self.cols + col]
    }
}

impl Index<usize> for Matrix {
    type Output = f64;

    fn index(&self, idx: usize) -> &f64 {
        &self.data[idx]
    }
}

impl IndexMut<usize> for Matrix {
    fn index_mut(&mut self, idx: usize) -> &mut f64 {
        &mut self.data[idx]
    }
}

// 行列同士の演算は形状エラーがあり得るため Result を返す

impl Add<&Matrix> for &Matrix {
    type Output = MathResult<Matrix>;

    fn add(self, rhs: &Matrix) -> MathResult<Matrix> {
        self.try_add(rhs)
    }
}

impl Sub<&Matrix> for &Matrix {
    type Output = MathResult<Matrix>;

    fn sub(self, rhs: &Matrix) -> MathResult<Matrix> {
        self.try_sub(rhs)
    }
}

impl Mul<&Matrix> for &Matrix {
    type Output = MathResult<Matrix>;

    fn mul(self, rhs: &Matrix) -> MathResult<Matrix> {
        self.matmul(rhs)
    }
}

impl Div<&Matrix> for &Matrix {
    type Output = MathResult<Matrix>;

    fn div(self, rhs: &Matrix) -> MathResult<Matrix> {
        self.elem_div(rhs)
    }
}

impl Neg for &Matrix {
    type Output = Matrix;

    fn neg(self) -> Matrix {
        self.map(|v| -v)
    }
}

// スカラー演算（右辺スカラー）

impl Add<f64> for &Matrix {
    type Output = Matrix;

    fn add(self, rhs: f64) -> Matrix {
        self.map(|v| v + rhs)
    }
}

impl Sub<f64> for &Matrix {
    type Output = Matrix;

    fn sub(self, rhs: f64) -> Matrix {
        self.map(|v| v - rhs)
    }
}

impl Mul<f64> for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: f64) -> Matrix {
        self.map(|v| v * rhs)
    }
}

impl Mul<f64> for Matrix {
    type Output = Matrix;

    fn mul(mut self, rhs: f64) -> Matrix {
        self *= rhs;
        self
    }
}

impl Div<f64> for &Matrix {
    type Output = MathResult<Matrix>;

    fn div(self, rhs: f64) -> MathResult<Matrix> {
        if rhs == 0.0 {
            return Err(MathError::DivideByZero);
        }
        Ok(self.map(|v| v / rhs))
    }
}

// スカラー演算（左辺スカラー）

impl Add<&Matrix> for f64 {
    type Output = Matrix;

    fn add(self, rhs: &Matrix) -> Matrix {
        rhs.map(|v| self + v)
    }
}

impl Sub<&Matrix> for f64 {
    type Output = Matrix;

    fn sub(self, rhs: &Matrix) -> Matrix {
        rhs.map(|v| self - v)
    }
}

impl Mul<&Matrix> for f64 {
    type Output = Matrix;

    fn mul(self, rhs: &Matrix) -> Matrix {
        rhs.map(|v| self * v)
    }
}

impl Div<&Matrix> for f64 {
    type Output = MathResult<Matrix>;

    fn div(self, rhs: &Matrix) -> MathResult<Matrix> {
        if rhs.data.iter().any(|v| *v == 0.0) {
            return Err(MathError::DivideByZero);
        }
        Ok(rhs.map(|v| self / v))
    }
}

impl AddAssign<f64> for Matrix {
    fn add_assign(&mut self, rhs: f64) {
        self.data.iter_mut().for_each(|v| *v += rhs);
    }
}

impl SubAssign<f64> for Matrix {
    fn sub_assign(&mut self, rhs: f64) {
        self.data.iter_mut().for_each(|v| *v -= rhs);
    }
}

impl MulAssign<f64> for Matrix {
    fn mul_assign(&mut self, rhs: f64) {
        self.data.iter_mut().for_each(|v| *v *= rhs);
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prec = f.precision().unwrap_or(6);
        for r in 0..self.rows {
            for c in 0..self.cols {
                if c > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{:>width$.prec$e}", self[(r, c)], width = prec + 8, prec = prec)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_identity(m: &Matrix, tol: f64) {
        let n = m.rows();
        for r in 0..n {
            for c in 0..n {
                let expected = if r == c { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(m[(r, c)], expected, epsilon = tol);
            }
        }
    }

    fn cheney_kincaid_4x4() -> Matrix {
        Matrix::from_rows(&[
            &[3.0, -13.0, 9.0, 3.0],
            &[-6.0, 4.0, 1.0, -18.0],
            &[6.0, -2.0, 2.0, 4.0],
            &[12.0, -8.0, 6.0, 10.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_construct_and_resize() {
        let mut m = Matrix::filled(2, 3, 1.5);
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.len(), 6);
        assert!(m.as_slice().iter().all(|v| *v == 1.5));

        m.resize(4, 1, 0.0);
        assert_eq!(m.shape(), (4, 1));
        assert_eq!(m.len(), 4);
        assert!(m.is_vector());
    }

    #[test]
    fn test_try_new_reports_memory_error() {
        let result = Matrix::try_new(usize::MAX, 2, 0.0);
        assert_eq!(result, Err(MathError::Memory { rows: usize::MAX, cols: 2 }));
        assert_eq!(Matrix::try_new(2, 2, 3.0).unwrap(), Matrix::filled(2, 2, 3.0));
    }

    #[test]
    fn test_element_access_out_of_range() {
        let mut m = Matrix::new(2, 2);
        m.set(1, 0, 4.0).unwrap();
        assert_eq!(m.get(1, 0).unwrap(), 4.0);
        assert!(m.get(2, 0).unwrap_err().is_dimension());
        assert!(m.set(0, 2, 1.0).unwrap_err().is_dimension());

        let v = Matrix::column(&[1.0, 2.0, 3.0]);
        assert_eq!(v.elem(2).unwrap(), 3.0);
        assert!(v.elem(3).unwrap_err().is_dimension());
    }

    #[test]
    fn test_row_and_col() {
        let m = Matrix::from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]).unwrap();
        assert_eq!(m.row(1).unwrap().as_slice(), &[3.0, 4.0]);
        assert_eq!(m.col(1).unwrap().as_slice(), &[2.0, 4.0]);
        assert!(m.col(2).is_err());
    }

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        let result = Matrix::from_rows(&[&[1.0, 2.0], &[3.0]]);
        assert!(result.unwrap_err().is_dimension());
    }

    #[test]
    fn test_arithmetic_dimension_checks() {
        let a = Matrix::new(2, 3);
        let b = Matrix::new(3, 2);
        assert!((&a + &b).unwrap_err().is_dimension());
        assert!((&a - &b).unwrap_err().is_dimension());
        assert!(a.matmul(&a).unwrap_err().is_dimension());
        assert_eq!(a.matmul(&b).unwrap().shape(), (2, 2));
    }

    #[test]
    fn test_matmul_values() {
        let a = Matrix::from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]).unwrap();
        let b = Matrix::from_rows(&[&[5.0, 6.0], &[7.0, 8.0]]).unwrap();
        let c = (&a * &b).unwrap();
        assert_eq!(c.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_scalar_operations_both_orders() {
        let a = Matrix::from_rows(&[&[1.0, 2.0], &[4.0, 8.0]]).unwrap();
        assert_eq!((&a + 1.0).as_slice(), &[2.0, 3.0, 5.0, 9.0]);
        assert_eq!((1.0 + &a).as_slice(), &[2.0, 3.0, 5.0, 9.0]);
        assert_eq!((&a - 1.0).as_slice(), &[0.0, 1.0, 3.0, 7.0]);
        assert_eq!((10.0 - &a).as_slice(), &[9.0, 8.0, 6.0, 2.0]);
        assert_eq!((2.0 * &a).as_slice(), &[2.0, 4.0, 8.0, 16.0]);
        assert_eq!((&a / 2.0).unwrap().as_slice(), &[0.5, 1.0, 2.0, 4.0]);
        assert_eq!((8.0 / &a).unwrap().as_slice(), &[8.0, 4.0, 2.0, 1.0]);

        let mut b = a.clone();
        b *= 0.5;
        b += 1.0;
        b -= 0.5;
        assert_eq!(b.as_slice(), &[1.0, 1.5, 2.5, 4.5]);
    }

    #[test]
    fn test_divide_by_zero() {
        let a = Matrix::filled(2, 2, 1.0);
        let mut z = Matrix::filled(2, 2, 1.0);
        z[(1, 1)] = 0.0;
        assert_eq!((&a / 0.0).unwrap_err(), MathError::DivideByZero);
        assert_eq!((&a / &z).unwrap_err(), MathError::DivideByZero);
        assert_eq!((1.0 / &z).unwrap_err(), MathError::DivideByZero);

        let mut c = a.clone();
        assert_eq!(c.try_elem_div_assign(&z).unwrap_err(), MathError::DivideByZero);
        assert_eq!(c.try_div_assign_scalar(0.0).unwrap_err(), MathError::DivideByZero);
        // 失敗した代入は値を変えない
        assert_eq!(c, a);
    }

    #[test]
    fn test_hadamard_accepts_zero_factor() {
        let a = Matrix::from_rows(&[&[2.0, 3.0], &[4.0, 5.0]]).unwrap();
        let z = Matrix::from_rows(&[&[0.0, 1.0], &[1.0, 0.0]]).unwrap();

        assert_eq!(a.hadamard(&z).unwrap().as_slice(), &[0.0, 3.0, 4.0, 0.0]);

        let mut c = a.clone();
        c.try_hadamard_assign(&z).unwrap();
        assert_eq!(c.as_slice(), &[0.0, 3.0, 4.0, 0.0]);

        // 形状違いは従来どおり Dimension
        let mut d = a.clone();
        assert!(matches!(d.try_hadamard_assign(&Matrix::new(1, 2)), Err(MathError::Dimension { .. })));
    }

    #[test]
    fn test_transpose_twice_is_identity() {
        let a = Matrix::from_rows(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]).unwrap();
        let t = a.transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t[(2, 1)], 6.0);
        assert_eq!(t.transpose(), a);
    }

    #[test]
    fn test_dot_product() {
        let row = Matrix::from_rows(&[&[1.0, 2.0, 3.0]]).unwrap();
        let col = Matrix::column(&[4.0, 5.0, 6.0]);
        assert_eq!(row.dot(&col).unwrap(), 32.0);
        assert!(row.dot(&Matrix::new(2, 1)).unwrap_err().is_dimension());
    }

    #[test]
    fn test_determinant() {
        assert_eq!(Matrix::identity(5).det().unwrap(), 1.0);

        let zero_row = Matrix::from_rows(&[&[1.0, 2.0, 3.0], &[0.0, 0.0, 0.0], &[7.0, 8.0, 10.0]]).unwrap();
        assert_eq!(zero_row.det().unwrap(), 0.0);

        let m = Matrix::from_rows(&[&[2.0, 0.0, 1.0], &[1.0, 3.0, 2.0], &[1.0, 1.0, 2.0]]).unwrap();
        assert_abs_diff_eq!(m.det().unwrap(), 6.0, epsilon = 1e-12);

        assert_abs_diff_eq!(cheney_kincaid_4x4().det().unwrap(), 144.0, epsilon = 1e-9);
        assert!(Matrix::new(2, 3).det().unwrap_err().is_dimension());
    }

    #[test]
    fn test_minor() {
        let m = Matrix::from_rows(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0], &[7.0, 8.0, 10.0]]).unwrap();
        // 1行0列を除いた [[2,3],[8,10]]
        assert_abs_diff_eq!(m.minor(1, 0).unwrap(), -4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_cheney_kincaid_case() {
        let a = cheney_kincaid_4x4();
        let inv = a.inverse().unwrap();
        assert_identity(&inv.matmul(&a).unwrap(), 1e-9);
        assert_identity(&a.matmul(&inv).unwrap(), 1e-9);
    }

    #[test]
    fn test_inverse_needs_pivoting() {
        // 先頭要素がゼロでもピボット選択で解ける
        let a = Matrix::from_rows(&[&[0.0, 2.0, 1.0], &[1.0, 0.0, 0.0], &[3.0, 0.0, 1.0]]).unwrap();
        let inv = a.inverse().unwrap();
        assert_identity(&a.matmul(&inv).unwrap(), 1e-12);
    }

    #[test]
    fn test_inverse_badly_scaled_rows() {
        let a = Matrix::from_rows(&[
            &[2.5e-7, 1.0e-12, 0.0],
            &[1.0e-12, 1.0e-15, 2.0e-16],
            &[0.0, 2.0e-16, 4.0e-10],
        ])
        .unwrap();
        let inv = a.inverse().unwrap();
        let prod = a.matmul(&inv).unwrap();
        assert_identity(&prod, 1e-9);
    }

    #[test]
    fn test_inverse_one_by_one() {
        let a = Matrix::filled(1, 1, 4.0);
        assert_eq!(a.inverse().unwrap()[(0, 0)], 0.25);
        assert_eq!(Matrix::new(1, 1).inverse().unwrap_err(), MathError::SingularMatrix);
    }

    #[test]
    fn test_inverse_singular_and_dimension() {
        let singular = Matrix::from_rows(&[&[1.0, 2.0], &[2.0, 4.0]]).unwrap();
        assert_eq!(singular.inverse().unwrap_err(), MathError::SingularMatrix);

        let zero_row = Matrix::from_rows(&[&[1.0, 2.0, 3.0], &[0.0, 0.0, 0.0], &[1.0, 0.0, 1.0]]).unwrap();
        assert_eq!(zero_row.inverse().unwrap_err(), MathError::SingularMatrix);

        assert!(Matrix::new(2, 3).inverse().unwrap_err().is_dimension());
    }

    #[test]
    fn test_symmetry() {
        let mut a = Matrix::from_rows(&[&[1.0, 2.0], &[2.0, 1.0]]).unwrap();
        assert!(a.is_symmetric(None));
        a[(1, 0)] = 2.0 + 1e-9;
        assert!(!a.is_symmetric(None));
        assert!(a.is_symmetric(Some(1e-8)));
        a.symmetrize().unwrap();
        assert!(a.is_symmetric(None));
        assert!(!Matrix::new(2, 3).is_symmetric(None));
    }

    #[test]
    fn test_cholesky_utu_known_case() {
        let a = Matrix::from_rows(&[&[25.0, 15.0, -5.0], &[15.0, 18.0, 0.0], &[-5.0, 0.0, 11.0]]).unwrap();
        let (u, pos_def) = a.cholesky_utu().unwrap();
        assert!(pos_def);
        let expected = [5.0, 3.0, -1.0, 0.0, 3.0, 1.0, 0.0, 0.0, 3.0];
        for (got, want) in u.as_slice().iter().zip(expected) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-12);
        }
        let rebuilt = u.transpose().matmul(&u).unwrap();
        for (got, want) in rebuilt.as_slice().iter().zip(a.as_slice()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_cholesky_llt_matches_utu() {
        let a = Matrix::from_rows(&[&[25.0, 15.0, -5.0], &[15.0, 18.0, 0.0], &[-5.0, 0.0, 11.0]]).unwrap();
        let (l, pos_def) = a.cholesky_llt().unwrap();
        assert!(pos_def);
        let (u, _) = a.cholesky_utu().unwrap();
        assert_eq!(l, u.transpose());
        let rebuilt = l.matmul(&l.transpose()).unwrap();
        for (got, want) in rebuilt.as_slice().iter().zip(a.as_slice()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_cholesky_not_positive_definite() {
        let indefinite = Matrix::from_rows(&[&[1.0, 2.0], &[2.0, 1.0]]).unwrap();
        let (factor, pos_def) = indefinite.cholesky_utu().unwrap();
        assert!(!pos_def);
        assert_eq!(factor, Matrix::new(2, 2));

        let (factor, pos_def) = indefinite.cholesky_llt().unwrap();
        assert!(!pos_def);
        assert_eq!(factor, Matrix::new(2, 2));

        let asymmetric = Matrix::from_rows(&[&[4.0, 1.0], &[0.0, 4.0]]).unwrap();
        assert!(!asymmetric.cholesky_utu().unwrap().1);
    }

    #[test]
    fn test_is_pos_def() {
        let spd = Matrix::from_rows(&[&[25.0, 15.0, -5.0], &[15.0, 18.0, 0.0], &[-5.0, 0.0, 11.0]]).unwrap();
        assert!(spd.is_pos_def().unwrap());
        let indefinite = Matrix::from_rows(&[&[1.0, 2.0], &[2.0, 1.0]]).unwrap();
        assert!(!indefinite.is_pos_def().unwrap());
        assert!(!Matrix::new(3, 3).is_pos_def().unwrap());
    }

    #[test]
    fn test_display() {
        let a = Matrix::identity(2);
        let text = format!("{:.2}", a);
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("1.00e0"));
    }
}
