//! # Four-State Integer Algebra
//!
//! Arbitrary-width integers over the SystemVerilog value set `{0, 1, X, Z}`,
//! used by constant evaluation. The representation is a pair of bit planes:
//! `val` carries the 0/1 plane, `xz` marks unknown bits (`xz=1, val=0` is X;
//! `xz=1, val=1` is Z). Bits at and above `width` are always zero in both
//! planes.
//!
//! Semantics follow the LRM rules the folding pass depends on:
//! - arithmetic with any unknown operand produces all-X
//! - division or modulo by zero produces all-X
//! - bitwise operators use the 4-state truth tables (`0 & X = 0`, `1 | X = 1`)
//! - ordered comparisons with unknowns produce a 1-bit X
//! - case equality compares X/Z exactly; wildcard equality treats X/Z in the
//!   right operand as don't-care
//!
//! Widths are preserved: binary operators extend to the wider operand, shifts
//! keep the left operand's width, and `resize` performs sign- or zero-
//! extension (including X/Z sign bits).

use crate::types::IrError;

/// A single 4-state bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bit {
    Zero,
    One,
    X,
    Z,
}

impl Bit {
    #[must_use]
    fn from_planes(val: bool, xz: bool) -> Self {
        match (xz, val) {
            (false, false) => Bit::Zero,
            (false, true) => Bit::One,
            (true, false) => Bit::X,
            (true, true) => Bit::Z,
        }
    }

    #[must_use]
    fn planes(self) -> (bool, bool) {
        match self {
            Bit::Zero => (false, false),
            Bit::One => (true, false),
            Bit::X => (false, true),
            Bit::Z => (true, true),
        }
    }

    #[must_use]
    fn is_unknown(self) -> bool {
        matches!(self, Bit::X | Bit::Z)
    }
}

/// Arbitrary-width 4-state integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvInt {
    width: u32,
    signed: bool,
    val: Vec<u64>,
    xz: Vec<u64>,
}

fn word_count(width: u32) -> usize {
    ((width as usize) + 63) / 64
}

impl SvInt {
    // =========================================================================
    // CONSTRUCTION
    // =========================================================================

    /// All-zero value of the given width.
    #[must_use]
    pub fn zero(width: u32, signed: bool) -> Self {
        let width = width.max(1);
        Self {
            width,
            signed,
            val: vec![0; word_count(width)],
            xz: vec![0; word_count(width)],
        }
    }

    /// Value from a `u64`, truncated to `width`.
    #[must_use]
    pub fn from_u64(width: u32, signed: bool, value: u64) -> Self {
        let mut out = Self::zero(width, signed);
        out.val[0] = value;
        out.normalize();
        out
    }

    /// A 1-bit boolean.
    #[must_use]
    pub fn from_bool(value: bool) -> Self {
        Self::from_u64(1, false, u64::from(value))
    }

    /// All bits X.
    #[must_use]
    pub fn all_x(width: u32, signed: bool) -> Self {
        let mut out = Self::zero(width, signed);
        for word in &mut out.xz {
            *word = u64::MAX;
        }
        out.normalize();
        out
    }

    /// A 1-bit X, the result of comparisons involving unknowns.
    #[must_use]
    pub fn unknown_bit() -> Self {
        Self::all_x(1, false)
    }

    fn normalize(&mut self) {
        let extra = (self.width as usize) % 64;
        let words = word_count(self.width);
        self.val.truncate(words);
        self.xz.truncate(words);
        while self.val.len() < words {
            self.val.push(0);
        }
        while self.xz.len() < words {
            self.xz.push(0);
        }
        if extra != 0 {
            let mask = (1u64 << extra) - 1;
            self.val[words - 1] &= mask;
            self.xz[words - 1] &= mask;
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Bit width (always positive).
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Signedness flag.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Return a copy with the signedness flag replaced.
    #[must_use]
    pub fn as_signed(&self, signed: bool) -> Self {
        let mut out = self.clone();
        out.signed = signed;
        out
    }

    /// True if any bit is X or Z.
    #[must_use]
    pub fn has_unknown(&self) -> bool {
        self.xz.iter().any(|w| *w != 0)
    }

    /// Bit at position `i` (LSB = 0); positions past the width read as zero.
    #[must_use]
    pub fn bit(&self, i: u32) -> Bit {
        if i >= self.width {
            return Bit::Zero;
        }
        let word = (i / 64) as usize;
        let mask = 1u64 << (i % 64);
        Bit::from_planes(self.val[word] & mask != 0, self.xz[word] & mask != 0)
    }

    fn set_bit(&mut self, i: u32, bit: Bit) {
        if i >= self.width {
            return;
        }
        let word = (i / 64) as usize;
        let mask = 1u64 << (i % 64);
        let (val, xz) = bit.planes();
        if val {
            self.val[word] |= mask;
        } else {
            self.val[word] &= !mask;
        }
        if xz {
            self.xz[word] |= mask;
        } else {
            self.xz[word] &= !mask;
        }
    }

    /// True iff the value is fully known and every bit is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        !self.has_unknown() && self.val.iter().all(|w| *w == 0)
    }

    /// True iff the value is fully known and every bit inside the width is one.
    #[must_use]
    pub fn is_all_ones(&self) -> bool {
        if self.has_unknown() {
            return false;
        }
        (0..self.width).all(|i| self.bit(i) == Bit::One)
    }

    /// Low 64 bits when the value is fully known and fits. `None` otherwise.
    #[must_use]
    pub fn to_u64(&self) -> Option<u64> {
        if self.has_unknown() {
            return None;
        }
        if self.val.iter().skip(1).any(|w| *w != 0) {
            return None;
        }
        Some(self.val[0])
    }

    fn sign_bit(&self) -> Bit {
        self.bit(self.width - 1)
    }

    /// Highest set bit position + 1, interpreting the value as unsigned.
    /// Zero for a zero value. Meaningless when unknowns are present.
    #[must_use]
    fn active_bits(&self) -> u32 {
        for i in (0..self.width).rev() {
            if self.bit(i) == Bit::One {
                return i + 1;
            }
        }
        0
    }

    // =========================================================================
    // WIDTH ADJUSTMENT
    // =========================================================================

    /// Truncate or extend to `new_width`. Extension replicates the sign bit
    /// (including X/Z) for signed values and pads zero otherwise.
    #[must_use]
    pub fn resize(&self, new_width: u32) -> Self {
        let new_width = new_width.max(1);
        let mut out = Self::zero(new_width, self.signed);
        let ext = if self.signed { self.sign_bit() } else { Bit::Zero };
        for i in 0..new_width {
            let bit = if i < self.width { self.bit(i) } else { ext };
            out.set_bit(i, bit);
        }
        out
    }

    /// Truncate to the low `new_width` bits (never extends semantics-wise;
    /// widening pads zero regardless of signedness).
    #[must_use]
    pub fn trunc(&self, new_width: u32) -> Self {
        let new_width = new_width.max(1);
        let mut out = Self::zero(new_width, self.signed);
        for i in 0..new_width.min(self.width) {
            out.set_bit(i, self.bit(i));
        }
        out
    }

    /// Concatenate, first element most significant. Fails on an empty list.
    pub fn concat(parts: &[SvInt]) -> Result<Self, IrError> {
        if parts.is_empty() {
            return Err(IrError::Literal {
                literal: String::new(),
                message: "concat of zero operands".to_string(),
            });
        }
        let total: u32 = parts.iter().map(|p| p.width).sum();
        let mut out = Self::zero(total, false);
        let mut cursor = total;
        for part in parts {
            cursor -= part.width;
            for i in 0..part.width {
                out.set_bit(cursor + i, part.bit(i));
            }
        }
        Ok(out)
    }

    /// Repeat the value `times` times, most significant copy first.
    pub fn replicate(&self, times: u32) -> Result<Self, IrError> {
        if times == 0 {
            return Err(IrError::Literal {
                literal: String::new(),
                message: "replicate count must be positive".to_string(),
            });
        }
        let copies: Vec<SvInt> = (0..times).map(|_| self.clone()).collect();
        Self::concat(&copies)
    }

    // =========================================================================
    // ARITHMETIC (any unknown operand -> all X)
    // =========================================================================

    fn common_width(&self, rhs: &Self) -> u32 {
        self.width.max(rhs.width)
    }

    fn result_signed(&self, rhs: &Self) -> bool {
        self.signed && rhs.signed
    }

    fn words_add(a: &[u64], b: &[u64]) -> Vec<u64> {
        let mut out = vec![0u64; a.len()];
        let mut carry = 0u64;
        for i in 0..a.len() {
            let (s1, c1) = a[i].overflowing_add(b[i]);
            let (s2, c2) = s1.overflowing_add(carry);
            out[i] = s2;
            carry = u64::from(c1) + u64::from(c2);
        }
        out
    }

    fn words_negate(a: &[u64]) -> Vec<u64> {
        let inverted: Vec<u64> = a.iter().map(|w| !w).collect();
        let one = {
            let mut v = vec![0u64; a.len()];
            v[0] = 1;
            v
        };
        Self::words_add(&inverted, &one)
    }

    /// Addition at the common width.
    #[must_use]
    pub fn add(&self, rhs: &Self) -> Self {
        self.arith(rhs, |a, b| Self::words_add(a, b))
    }

    /// Subtraction at the common width.
    #[must_use]
    pub fn sub(&self, rhs: &Self) -> Self {
        self.arith(rhs, |a, b| Self::words_add(a, &Self::words_negate(b)))
    }

    fn arith(&self, rhs: &Self, f: impl Fn(&[u64], &[u64]) -> Vec<u64>) -> Self {
        let width = self.common_width(rhs);
        let signed = self.result_signed(rhs);
        if self.has_unknown() || rhs.has_unknown() {
            return Self::all_x(width, signed);
        }
        let a = self.resize(width).as_signed(signed);
        let b = rhs.resize(width).as_signed(signed);
        let mut out = Self::zero(width, signed);
        out.val = f(&a.val, &b.val);
        out.normalize();
        out
    }

    /// Multiplication at the common width.
    #[must_use]
    pub fn mul(&self, rhs: &Self) -> Self {
        let width = self.common_width(rhs);
        let signed = self.result_signed(rhs);
        if self.has_unknown() || rhs.has_unknown() {
            return Self::all_x(width, signed);
        }
        let a = self.resize(width).as_signed(signed);
        let b = rhs.resize(width).as_signed(signed);
        let mut acc = Self::zero(width, signed);
        // Schoolbook shift-add; widths in practice are small.
        for i in 0..width {
            if b.bit(i) == Bit::One {
                let shifted = a.shl_const(i);
                acc.val = Self::words_add(&acc.val, &shifted.val);
                acc.normalize();
            }
        }
        acc
    }

    fn magnitude(&self) -> (Self, bool) {
        if self.signed && self.sign_bit() == Bit::One {
            let negated = Self::zero(self.width, false).sub(&self.as_signed(false));
            (negated.as_signed(false), true)
        } else {
            (self.as_signed(false), false)
        }
    }

    fn cmp_magnitude(a: &Self, b: &Self) -> std::cmp::Ordering {
        let width = a.width.max(b.width);
        for i in (0..width).rev() {
            let (ba, bb) = (a.bit(i), b.bit(i));
            if ba != bb {
                return if ba == Bit::One {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Less
                };
            }
        }
        std::cmp::Ordering::Equal
    }

    fn divmod_magnitude(num: &Self, den: &Self) -> (Self, Self) {
        let width = num.width;
        let mut quotient = Self::zero(width, false);
        let mut remainder = Self::zero(width.max(den.width), false);
        for i in (0..width).rev() {
            // remainder = (remainder << 1) | num[i]
            remainder = remainder.shl_const(1);
            if num.bit(i) == Bit::One {
                remainder.set_bit(0, Bit::One);
            }
            if Self::cmp_magnitude(&remainder, den) != std::cmp::Ordering::Less {
                remainder = remainder.sub(den).trunc(remainder.width);
                quotient.set_bit(i, Bit::One);
            }
        }
        (quotient, remainder.trunc(width))
    }

    /// Division at the common width; division by zero yields all-X.
    #[must_use]
    pub fn div(&self, rhs: &Self) -> Self {
        let width = self.common_width(rhs);
        let signed = self.result_signed(rhs);
        if self.has_unknown() || rhs.has_unknown() || rhs.is_zero() {
            return Self::all_x(width, signed);
        }
        let a = self.resize(width).as_signed(signed);
        let b = rhs.resize(width).as_signed(signed);
        let (ma, neg_a) = a.magnitude();
        let (mb, neg_b) = b.magnitude();
        let (q, _) = Self::divmod_magnitude(&ma, &mb);
        let out = if neg_a != neg_b {
            Self::zero(width, signed).sub(&q.as_signed(signed))
        } else {
            q
        };
        out.trunc(width).as_signed(signed)
    }

    /// Modulo at the common width; the remainder takes the dividend's sign.
    #[must_use]
    pub fn rem(&self, rhs: &Self) -> Self {
        let width = self.common_width(rhs);
        let signed = self.result_signed(rhs);
        if self.has_unknown() || rhs.has_unknown() || rhs.is_zero() {
            return Self::all_x(width, signed);
        }
        let a = self.resize(width).as_signed(signed);
        let b = rhs.resize(width).as_signed(signed);
        let (ma, neg_a) = a.magnitude();
        let (mb, _) = b.magnitude();
        let (_, r) = Self::divmod_magnitude(&ma, &mb);
        let out = if neg_a {
            Self::zero(width, signed).sub(&r.as_signed(signed))
        } else {
            r
        };
        out.trunc(width).as_signed(signed)
    }

    // =========================================================================
    // BITWISE (4-state truth tables)
    // =========================================================================

    fn bitwise(&self, rhs: &Self, f: impl Fn(Bit, Bit) -> Bit) -> Self {
        let width = self.common_width(rhs);
        let a = self.resize(width);
        let b = rhs.resize(width);
        let mut out = Self::zero(width, self.result_signed(rhs));
        for i in 0..width {
            out.set_bit(i, f(a.bit(i), b.bit(i)));
        }
        out
    }

    fn bit_and(a: Bit, b: Bit) -> Bit {
        match (a, b) {
            (Bit::Zero, _) | (_, Bit::Zero) => Bit::Zero,
            (Bit::One, Bit::One) => Bit::One,
            _ => Bit::X,
        }
    }

    fn bit_or(a: Bit, b: Bit) -> Bit {
        match (a, b) {
            (Bit::One, _) | (_, Bit::One) => Bit::One,
            (Bit::Zero, Bit::Zero) => Bit::Zero,
            _ => Bit::X,
        }
    }

    fn bit_xor(a: Bit, b: Bit) -> Bit {
        if a.is_unknown() || b.is_unknown() {
            Bit::X
        } else if a == b {
            Bit::Zero
        } else {
            Bit::One
        }
    }

    fn bit_not(a: Bit) -> Bit {
        match a {
            Bit::Zero => Bit::One,
            Bit::One => Bit::Zero,
            _ => Bit::X,
        }
    }

    /// Bitwise AND.
    #[must_use]
    pub fn and(&self, rhs: &Self) -> Self {
        self.bitwise(rhs, Self::bit_and)
    }

    /// Bitwise OR.
    #[must_use]
    pub fn or(&self, rhs: &Self) -> Self {
        self.bitwise(rhs, Self::bit_or)
    }

    /// Bitwise XOR.
    #[must_use]
    pub fn xor(&self, rhs: &Self) -> Self {
        self.bitwise(rhs, Self::bit_xor)
    }

    /// Bitwise XNOR.
    #[must_use]
    pub fn xnor(&self, rhs: &Self) -> Self {
        self.bitwise(rhs, |a, b| Self::bit_not(Self::bit_xor(a, b)))
    }

    /// Bitwise NOT.
    #[must_use]
    pub fn not(&self) -> Self {
        let mut out = Self::zero(self.width, self.signed);
        for i in 0..self.width {
            out.set_bit(i, Self::bit_not(self.bit(i)));
        }
        out
    }

    // =========================================================================
    // REDUCTIONS AND LOGICAL OPERATORS (1-bit results)
    // =========================================================================

    /// Truthiness: `Some(true)` if any bit is 1, `Some(false)` if all bits
    /// are known zero, `None` when unknowns leave it undecided.
    #[must_use]
    pub fn to_bool(&self) -> Option<bool> {
        let mut saw_unknown = false;
        for i in 0..self.width {
            match self.bit(i) {
                Bit::One => return Some(true),
                Bit::X | Bit::Z => saw_unknown = true,
                Bit::Zero => {}
            }
        }
        if saw_unknown { None } else { Some(false) }
    }

    fn bool_result(value: Option<bool>) -> Self {
        match value {
            Some(b) => Self::from_bool(b),
            None => Self::unknown_bit(),
        }
    }

    /// Reduction AND.
    #[must_use]
    pub fn reduce_and(&self) -> Self {
        let mut unknown = false;
        for i in 0..self.width {
            match self.bit(i) {
                Bit::Zero => return Self::from_bool(false),
                Bit::X | Bit::Z => unknown = true,
                Bit::One => {}
            }
        }
        Self::bool_result(if unknown { None } else { Some(true) })
    }

    /// Reduction OR.
    #[must_use]
    pub fn reduce_or(&self) -> Self {
        Self::bool_result(self.to_bool())
    }

    /// Reduction XOR (parity); unknown if any bit is unknown.
    #[must_use]
    pub fn reduce_xor(&self) -> Self {
        let mut parity = false;
        for i in 0..self.width {
            match self.bit(i) {
                Bit::One => parity = !parity,
                Bit::X | Bit::Z => return Self::unknown_bit(),
                Bit::Zero => {}
            }
        }
        Self::from_bool(parity)
    }

    /// Logical AND (`&&`).
    #[must_use]
    pub fn logic_and(&self, rhs: &Self) -> Self {
        match (self.to_bool(), rhs.to_bool()) {
            (Some(false), _) | (_, Some(false)) => Self::from_bool(false),
            (Some(true), Some(true)) => Self::from_bool(true),
            _ => Self::unknown_bit(),
        }
    }

    /// Logical OR (`||`).
    #[must_use]
    pub fn logic_or(&self, rhs: &Self) -> Self {
        match (self.to_bool(), rhs.to_bool()) {
            (Some(true), _) | (_, Some(true)) => Self::from_bool(true),
            (Some(false), Some(false)) => Self::from_bool(false),
            _ => Self::unknown_bit(),
        }
    }

    /// Logical NOT (`!`).
    #[must_use]
    pub fn logic_not(&self) -> Self {
        Self::bool_result(self.to_bool().map(|b| !b))
    }

    // =========================================================================
    // SHIFTS (left operand's width preserved)
    // =========================================================================

    fn shl_const(&self, amount: u32) -> Self {
        let mut out = Self::zero(self.width, self.signed);
        for i in amount..self.width {
            out.set_bit(i, self.bit(i - amount));
        }
        out
    }

    fn lshr_const(&self, amount: u32) -> Self {
        let mut out = Self::zero(self.width, self.signed);
        if amount < self.width {
            for i in 0..self.width - amount {
                out.set_bit(i, self.bit(i + amount));
            }
        }
        out
    }

    fn ashr_const(&self, amount: u32) -> Self {
        let fill = if self.signed { self.sign_bit() } else { Bit::Zero };
        let mut out = Self::zero(self.width, self.signed);
        for i in 0..self.width {
            let src = i as u64 + u64::from(amount);
            let bit = if src < u64::from(self.width) { self.bit(src as u32) } else { fill };
            out.set_bit(i, bit);
        }
        out
    }

    fn shift_amount(rhs: &Self) -> Option<u32> {
        rhs.to_u64().map(|v| v.min(u64::from(u32::MAX)) as u32)
    }

    /// Logical shift left; unknown amount produces all-X.
    #[must_use]
    pub fn shl(&self, rhs: &Self) -> Self {
        match Self::shift_amount(rhs) {
            Some(amount) => self.shl_const(amount.min(self.width)),
            None => Self::all_x(self.width, self.signed),
        }
    }

    /// Logical shift right.
    #[must_use]
    pub fn lshr(&self, rhs: &Self) -> Self {
        match Self::shift_amount(rhs) {
            Some(amount) => self.lshr_const(amount.min(self.width)),
            None => Self::all_x(self.width, self.signed),
        }
    }

    /// Logical shift right by a constant amount (used by slicing).
    #[must_use]
    pub fn lshr_by(&self, amount: u32) -> Self {
        self.lshr_const(amount.min(self.width))
    }

    /// Arithmetic shift right.
    #[must_use]
    pub fn ashr(&self, rhs: &Self) -> Self {
        match Self::shift_amount(rhs) {
            Some(amount) => self.ashr_const(amount.min(self.width)),
            None => Self::all_x(self.width, self.signed),
        }
    }

    // =========================================================================
    // COMPARISONS (1-bit results)
    // =========================================================================

    /// `==` — unknown operands produce X.
    #[must_use]
    pub fn eq_logic(&self, rhs: &Self) -> Self {
        if self.has_unknown() || rhs.has_unknown() {
            return Self::unknown_bit();
        }
        let width = self.common_width(rhs);
        let signed = self.result_signed(rhs);
        let a = self.as_signed(signed).resize(width);
        let b = rhs.as_signed(signed).resize(width);
        Self::from_bool(a.val == b.val)
    }

    /// `!=` — unknown operands produce X.
    #[must_use]
    pub fn ne_logic(&self, rhs: &Self) -> Self {
        self.eq_logic(rhs).logic_not()
    }

    fn ordered(&self, rhs: &Self) -> Option<std::cmp::Ordering> {
        if self.has_unknown() || rhs.has_unknown() {
            return None;
        }
        let width = self.common_width(rhs);
        let signed = self.result_signed(rhs);
        let a = self.as_signed(signed).resize(width);
        let b = rhs.as_signed(signed).resize(width);
        if signed {
            let (sa, sb) = (a.sign_bit(), b.sign_bit());
            if sa != sb {
                return Some(if sa == Bit::One {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Greater
                });
            }
        }
        Some(Self::cmp_magnitude(&a, &b))
    }

    /// `<`
    #[must_use]
    pub fn lt(&self, rhs: &Self) -> Self {
        Self::bool_result(self.ordered(rhs).map(std::cmp::Ordering::is_lt))
    }

    /// `<=`
    #[must_use]
    pub fn le(&self, rhs: &Self) -> Self {
        Self::bool_result(self.ordered(rhs).map(std::cmp::Ordering::is_le))
    }

    /// `>`
    #[must_use]
    pub fn gt(&self, rhs: &Self) -> Self {
        Self::bool_result(self.ordered(rhs).map(std::cmp::Ordering::is_gt))
    }

    /// `>=`
    #[must_use]
    pub fn ge(&self, rhs: &Self) -> Self {
        Self::bool_result(self.ordered(rhs).map(std::cmp::Ordering::is_ge))
    }

    /// Case equality (`===`): exact 4-state match, always a known result.
    #[must_use]
    pub fn case_eq(&self, rhs: &Self) -> bool {
        let width = self.common_width(rhs);
        let a = self.resize(width);
        let b = rhs.resize(width);
        (0..width).all(|i| a.bit(i) == b.bit(i))
    }

    /// Wildcard equality (`==?`): X/Z bits in `rhs` match anything; the
    /// remaining positions compare exactly.
    #[must_use]
    pub fn wildcard_eq(&self, rhs: &Self) -> bool {
        let width = self.common_width(rhs);
        let a = self.resize(width);
        let b = rhs.resize(width);
        (0..width).all(|i| b.bit(i).is_unknown() || a.bit(i) == b.bit(i))
    }

    // =========================================================================
    // CONDITIONAL
    // =========================================================================

    /// Mux semantics: a known condition selects one side; an unknown
    /// condition merges bitwise (equal known bits survive, the rest go X).
    #[must_use]
    pub fn conditional(cond: &Self, t: &Self, f: &Self) -> Self {
        match cond.to_bool() {
            Some(true) => t.clone(),
            Some(false) => f.clone(),
            None => {
                let width = t.width.max(f.width);
                let a = t.resize(width);
                let b = f.resize(width);
                let mut out = Self::zero(width, t.result_signed(f));
                for i in 0..width {
                    let (ba, bb) = (a.bit(i), b.bit(i));
                    let bit = if ba == bb && !ba.is_unknown() { ba } else { Bit::X };
                    out.set_bit(i, bit);
                }
                out
            }
        }
    }

    // =========================================================================
    // SYSTEM FUNCTIONS
    // =========================================================================

    /// `$clog2`: ceiling log2 of the unsigned interpretation. Zero and one
    /// both map to zero. Unknown input yields `None`.
    #[must_use]
    pub fn clog2(&self) -> Option<u32> {
        if self.has_unknown() {
            return None;
        }
        let active = self.active_bits();
        if active <= 1 {
            return Some(0);
        }
        // ceil(log2(v)) == active_bits(v - 1)
        let one = Self::from_u64(self.width, false, 1);
        let minus_one = self.as_signed(false).sub(&one);
        Some(minus_one.trunc(self.width).active_bits())
    }

    // =========================================================================
    // LITERALS
    // =========================================================================

    /// Canonical literal: hex when fully known, per-bit binary when any bit
    /// is X/Z. The constant pool and the JSON codec key on this spelling.
    #[must_use]
    pub fn to_literal(&self) -> String {
        let sign = if self.signed { "s" } else { "" };
        if self.has_unknown() {
            let mut bits = String::with_capacity(self.width as usize);
            for i in (0..self.width).rev() {
                bits.push(match self.bit(i) {
                    Bit::Zero => '0',
                    Bit::One => '1',
                    Bit::X => 'x',
                    Bit::Z => 'z',
                });
            }
            return format!("{}'{}b{}", self.width, sign, bits);
        }
        let nibbles = (self.width as usize + 3) / 4;
        let mut digits = String::with_capacity(nibbles);
        let mut leading = true;
        for n in (0..nibbles).rev() {
            let mut nibble = 0u8;
            for b in 0..4 {
                let pos = (n * 4 + b) as u32;
                if pos < self.width && self.bit(pos) == Bit::One {
                    nibble |= 1 << b;
                }
            }
            if nibble == 0 && leading && n != 0 {
                continue;
            }
            leading = false;
            digits.push(char::from_digit(u32::from(nibble), 16).unwrap_or('0'));
        }
        format!("{}'{}h{}", self.width, sign, digits)
    }

    /// Parse a SystemVerilog literal: `[width]'[s]<base><digits>` with bases
    /// `b`/`o`/`d`/`h`, underscores allowed, `x`/`z` digits in non-decimal
    /// bases, or a bare decimal (32-bit unsigned). Digits shorter than the
    /// width extend with the leading digit's X/Z state or zero.
    pub fn from_literal(text: &str) -> Result<Self, IrError> {
        let bad = |message: &str| IrError::Literal {
            literal: text.to_string(),
            message: message.to_string(),
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(bad("empty literal"));
        }

        let Some(tick) = trimmed.find('\'') else {
            // Bare decimal, 32-bit unsigned.
            let digits: String = trimmed.chars().filter(|c| *c != '_').collect();
            let value: u64 = digits.parse().map_err(|_| bad("expected decimal digits"))?;
            return Ok(Self::from_u64(32, false, value));
        };

        let width: u32 = if tick == 0 {
            32
        } else {
            trimmed[..tick]
                .parse()
                .map_err(|_| bad("bad width prefix"))?
        };
        if width == 0 {
            return Err(bad("width must be positive"));
        }

        let mut rest = trimmed[tick + 1..].chars().peekable();
        let mut signed = false;
        if matches!(rest.peek(), Some('s' | 'S')) {
            signed = true;
            rest.next();
        }
        let base = rest.next().ok_or_else(|| bad("missing base"))?;
        let digits: Vec<char> = rest
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if digits.is_empty() {
            return Err(bad("missing digits"));
        }

        let bits_per = match base.to_ascii_lowercase() {
            'b' => 1,
            'o' => 3,
            'h' => 4,
            'd' => 0,
            _ => return Err(bad("unknown base")),
        };

        let mut out = Self::zero(width, signed);
        if bits_per == 0 {
            let string: String = digits.iter().collect();
            let value: u64 = string.parse().map_err(|_| bad("bad decimal digits"))?;
            out.val[0] = value;
            out.normalize();
            return Ok(out);
        }

        // Lay digits down LSB-first, then extend with the leading digit's
        // X/Z state when the literal covers fewer bits than the width.
        let mut pos: u32 = 0;
        for ch in digits.iter().rev() {
            let states: Vec<Bit> = match ch {
                'x' => vec![Bit::X; bits_per],
                'z' | '?' => vec![Bit::Z; bits_per],
                _ => {
                    let digit = ch.to_digit(16).ok_or_else(|| bad("bad digit"))?;
                    if digit >= (1 << bits_per) {
                        return Err(bad("digit out of range for base"));
                    }
                    (0..bits_per)
                        .map(|b| if digit & (1 << b) != 0 { Bit::One } else { Bit::Zero })
                        .collect()
                }
            };
            for bit in states {
                if pos < width {
                    out.set_bit(pos, bit);
                }
                pos += 1;
            }
        }
        if pos < width {
            let fill = match digits.first() {
                Some('x') => Bit::X,
                Some('z' | '?') => Bit::Z,
                _ => Bit::Zero,
            };
            if fill != Bit::Zero {
                for i in pos..width {
                    out.set_bit(i, fill);
                }
            }
        }
        Ok(out)
    }
}

// =============================================================================
// TESTS
// =============================================================================
