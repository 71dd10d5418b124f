//! Cache key derivation.
//!
//! A call's arguments are collected into [`Args`] (ordered positional values
//! plus named keyword values) and folded into a [`CacheKey`]. Each argument is
//! converted to an [`ArgValue`] through the [`KeyArg`] trait, so only values
//! with a well-defined hashable representation can reach the cache.

use crate::receiver::ReceiverId;
use std::any::type_name;
use std::collections::hash_map::DefaultHasher;
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

// Floats in this range convert to i128 without saturating.
const I128_FLOAT_BOUND: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

/// Hashable representation of a single argument value.
///
/// Integers and floats compare by numeric value: `Int(1) == Float(1.0)`.
/// Types are only told apart when the cache is type-sensitive, in which case
/// the Rust type name travels next to the value (see [`Arg`]).
#[derive(Clone, Debug)]
pub enum ArgValue {
    Nil,
    Bool(bool),
    Int(i128),
    Float(f64),
    Char(char),
    Str(Arc<str>),
    Bytes(Arc<[u8]>),
    Seq(Vec<ArgValue>),
    Receiver(ReceiverId),
}

impl ArgValue {
    fn as_integral(f: f64) -> Option<i128> {
        if f.is_finite() && f.fract() == 0.0 && f.abs() < I128_FLOAT_BOUND {
            Some(f as i128)
        } else {
            None
        }
    }
}

impl PartialEq for ArgValue {
    fn eq(&self, other: &Self) -> bool {
        use ArgValue::*;
        match (self, other) {
            (Nil, Nil) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Int(i), Float(f)) | (Float(f), Int(i)) => Self::as_integral(*f) == Some(*i),
            (Char(a), Char(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Seq(a), Seq(b)) => a == b,
            (Receiver(a), Receiver(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ArgValue {}

impl Hash for ArgValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use ArgValue::*;
        match self {
            Nil => state.write_u8(0),
            Bool(b) => {
                state.write_u8(1);
                b.hash(state);
            }
            Int(i) => {
                state.write_u8(2);
                i.hash(state);
            }
            Float(f) => match Self::as_integral(*f) {
                // Must agree with Int for equal numbers.
                Some(i) => {
                    state.write_u8(2);
                    i.hash(state);
                }
                None => {
                    state.write_u8(3);
                    let bits = if f.is_nan() { f64::NAN.to_bits() } else { f.to_bits() };
                    bits.hash(state);
                }
            },
            Char(c) => {
                state.write_u8(4);
                c.hash(state);
            }
            Str(s) => {
                state.write_u8(5);
                s.hash(state);
            }
            Bytes(b) => {
                state.write_u8(6);
                b.hash(state);
            }
            Seq(items) => {
                state.write_u8(7);
                items.hash(state);
            }
            Receiver(id) => {
                state.write_u8(8);
                id.hash(state);
            }
        }
    }
}

/// Converts a value into cache key material.
///
/// Implement this for your own argument types, typically by delegating to a
/// field or a tuple of fields:
///
/// ```
/// use lrumemo_core::{ArgValue, KeyArg};
///
/// struct UserId {
///     tenant: String,
///     id: u64,
/// }
///
/// impl KeyArg for UserId {
///     fn to_arg_value(&self) -> ArgValue {
///         (self.tenant.as_str(), self.id).to_arg_value()
///     }
/// }
/// ```
pub trait KeyArg {
    fn to_arg_value(&self) -> ArgValue;
}

macro_rules! impl_key_arg_int {
    ($($t:ty),*) => {
        $(
            impl KeyArg for $t {
                fn to_arg_value(&self) -> ArgValue {
                    ArgValue::Int(*self as i128)
                }
            }
        )*
    };
}

impl_key_arg_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, usize);

impl KeyArg for f32 {
    fn to_arg_value(&self) -> ArgValue {
        ArgValue::Float(f64::from(*self))
    }
}

impl KeyArg for f64 {
    fn to_arg_value(&self) -> ArgValue {
        ArgValue::Float(*self)
    }
}

impl KeyArg for bool {
    fn to_arg_value(&self) -> ArgValue {
        ArgValue::Bool(*self)
    }
}

impl KeyArg for char {
    fn to_arg_value(&self) -> ArgValue {
        ArgValue::Char(*self)
    }
}

impl KeyArg for () {
    fn to_arg_value(&self) -> ArgValue {
        ArgValue::Nil
    }
}

impl KeyArg for str {
    fn to_arg_value(&self) -> ArgValue {
        ArgValue::Str(Arc::from(self))
    }
}

impl KeyArg for String {
    fn to_arg_value(&self) -> ArgValue {
        ArgValue::Str(Arc::from(self.as_str()))
    }
}

impl<T: KeyArg> KeyArg for [T] {
    fn to_arg_value(&self) -> ArgValue {
        ArgValue::Seq(self.iter().map(KeyArg::to_arg_value).collect())
    }
}

impl<T: KeyArg> KeyArg for Vec<T> {
    fn to_arg_value(&self) -> ArgValue {
        self.as_slice().to_arg_value()
    }
}

impl<T: KeyArg, const N: usize> KeyArg for [T; N] {
    fn to_arg_value(&self) -> ArgValue {
        self.as_slice().to_arg_value()
    }
}

/// `None` keys as `Nil`; `Some(x)` keys exactly like `x`.
impl<T: KeyArg> KeyArg for Option<T> {
    fn to_arg_value(&self) -> ArgValue {
        match self {
            Some(value) => value.to_arg_value(),
            None => ArgValue::Nil,
        }
    }
}

impl<T: KeyArg + ?Sized> KeyArg for &T {
    fn to_arg_value(&self) -> ArgValue {
        (**self).to_arg_value()
    }
}

impl<T: KeyArg + ?Sized> KeyArg for Box<T> {
    fn to_arg_value(&self) -> ArgValue {
        (**self).to_arg_value()
    }
}

impl<T: KeyArg + ?Sized> KeyArg for Arc<T> {
    fn to_arg_value(&self) -> ArgValue {
        (**self).to_arg_value()
    }
}

macro_rules! impl_key_arg_tuple {
    ($($name:ident),+) => {
        impl<$($name: KeyArg),+> KeyArg for ($($name,)+) {
            #[allow(non_snake_case)]
            fn to_arg_value(&self) -> ArgValue {
                let ($($name,)+) = self;
                ArgValue::Seq(vec![$($name.to_arg_value()),+])
            }
        }
    };
}

impl_key_arg_tuple!(A);
impl_key_arg_tuple!(A, B);
impl_key_arg_tuple!(A, B, C);
impl_key_arg_tuple!(A, B, C, D);
impl_key_arg_tuple!(A, B, C, D, E);
impl_key_arg_tuple!(A, B, C, D, E, F);

/// Keys a value by its `Debug` rendering.
///
/// Handy for types that are awkward to describe field by field. Two values
/// share a key exactly when they print identically.
///
/// ```
/// use lrumemo_core::{ArgValue, DebugArg, KeyArg};
///
/// #[derive(Debug)]
/// enum Region {
///     Eu,
/// }
///
/// let value = DebugArg(Region::Eu).to_arg_value();
/// assert!(matches!(value, ArgValue::Str(ref s) if &**s == "Eu"));
/// ```
pub struct DebugArg<T>(pub T);

impl<T: Debug> KeyArg for DebugArg<T> {
    fn to_arg_value(&self) -> ArgValue {
        ArgValue::Str(Arc::from(format!("{:?}", self.0)))
    }
}

/// Keys a byte buffer as opaque bytes rather than a sequence of integers.
///
/// ```
/// use lrumemo_core::{ArgValue, ByteArg, KeyArg};
///
/// let value = ByteArg(vec![0xde, 0xad]).to_arg_value();
/// assert!(matches!(value, ArgValue::Bytes(ref b) if &b[..] == &[0xde, 0xad][..]));
/// ```
pub struct ByteArg<T>(pub T);

impl<T: AsRef<[u8]>> KeyArg for ByteArg<T> {
    fn to_arg_value(&self) -> ArgValue {
        ArgValue::Bytes(Arc::from(self.0.as_ref()))
    }
}

/// One argument: its key value plus the Rust type it came from.
#[derive(Clone, Debug)]
pub struct Arg {
    value: ArgValue,
    type_name: &'static str,
}

impl Arg {
    pub fn new<T: KeyArg + ?Sized>(value: &T) -> Self {
        Self {
            value: value.to_arg_value(),
            type_name: type_name::<T>(),
        }
    }

    pub fn receiver<T>(id: ReceiverId) -> Self {
        Self {
            value: ArgValue::Receiver(id),
            type_name: type_name::<T>(),
        }
    }

    pub fn value(&self) -> &ArgValue {
        &self.value
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// The arguments of one call.
///
/// # Examples
///
/// ```
/// use lrumemo_core::{Args, CacheKey};
///
/// let a = Args::new().arg(&1).kwarg("limit", &10).kwarg("page", &2);
/// let b = Args::new().arg(&1).kwarg("page", &2).kwarg("limit", &10);
///
/// // Keyword order does not matter.
/// assert_eq!(CacheKey::new(&a, false), CacheKey::new(&b, false));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Args {
    positional: Vec<Arg>,
    keywords: Vec<(String, Arg)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg<T: KeyArg + ?Sized>(mut self, value: &T) -> Self {
        self.positional.push(Arg::new(value));
        self
    }

    /// Adds a keyword argument. Repeating a name replaces the earlier value.
    pub fn kwarg<T: KeyArg + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        let name = name.into();
        let arg = Arg::new(value);
        match self.keywords.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = arg,
            None => self.keywords.push((name, arg)),
        }
        self
    }

    /// Inserts the receiver as the first positional argument.
    pub(crate) fn with_receiver(mut self, receiver: Arg) -> Self {
        self.positional.insert(0, receiver);
        self
    }

    pub fn positional(&self) -> &[Arg] {
        &self.positional
    }

    pub fn keywords(&self) -> &[(String, Arg)] {
        &self.keywords
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct KeyPart {
    value: ArgValue,
    type_name: Option<&'static str>,
}

impl KeyPart {
    fn new(arg: &Arg, type_sensitive: bool) -> Self {
        Self {
            value: arg.value.clone(),
            type_name: type_sensitive.then_some(arg.type_name),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct KeyParts {
    positional: Vec<KeyPart>,
    keywords: Vec<(String, KeyPart)>,
}

/// Identity of a call's arguments.
///
/// The hash is computed once on construction; clones share the underlying
/// parts, so moving keys between the map and the recency list is cheap.
#[derive(Clone)]
pub struct CacheKey {
    parts: Arc<KeyParts>,
    hash: u64,
}

impl CacheKey {
    pub fn new(args: &Args, type_sensitive: bool) -> Self {
        let positional = args
            .positional
            .iter()
            .map(|arg| KeyPart::new(arg, type_sensitive))
            .collect();

        let mut keywords: Vec<(String, KeyPart)> = args
            .keywords
            .iter()
            .map(|(name, arg)| (name.clone(), KeyPart::new(arg, type_sensitive)))
            .collect();
        keywords.sort_by(|a, b| a.0.cmp(&b.0));

        let parts = KeyParts {
            positional,
            keywords,
        };
        let mut hasher = DefaultHasher::new();
        parts.hash(&mut hasher);

        Self {
            hash: hasher.finish(),
            parts: Arc::new(parts),
        }
    }

    /// True when any receiver referenced by this key has been dropped.
    pub fn has_dead_receiver(&self) -> bool {
        self.parts
            .positional
            .iter()
            .any(|part| matches!(&part.value, ArgValue::Receiver(id) if !id.is_alive()))
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && (Arc::ptr_eq(&self.parts, &other.parts) || self.parts == other.parts)
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for part in &self.parts.positional {
            list.entry(&part.value);
        }
        for (name, part) in &self.parts.keywords {
            list.entry(&format_args!("{}={:?}", name, part.value));
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReceiverHandle;
    use std::collections::HashSet;

    fn key(args: Args, type_sensitive: bool) -> CacheKey {
        CacheKey::new(&args, type_sensitive)
    }

    #[test]
    fn test_equal_arguments_equal_keys() {
        let a = key(Args::new().arg(&1).arg("x"), false);
        let b = key(Args::new().arg(&1).arg("x"), false);
        assert_eq!(a, b);

        let set: HashSet<CacheKey> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_different_values_different_keys() {
        assert_ne!(key(Args::new().arg(&1), false), key(Args::new().arg(&2), false));
        assert_ne!(
            key(Args::new().arg(&1).arg(&2), false),
            key(Args::new().arg(&2).arg(&1), false)
        );
        assert_ne!(key(Args::new().arg("1"), false), key(Args::new().arg(&1), false));
    }

    #[test]
    fn test_int_and_float_collide_without_type_sensitivity() {
        let int = key(Args::new().arg(&1_i64), false);
        let float = key(Args::new().arg(&1.0_f64), false);
        assert_eq!(int, float);

        let set: HashSet<CacheKey> = [int, float].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_type_sensitive_keys_distinguish_types() {
        assert_ne!(
            key(Args::new().arg(&1_i64), true),
            key(Args::new().arg(&1.0_f64), true)
        );
        assert_ne!(
            key(Args::new().arg(&1_i32), true),
            key(Args::new().arg(&1_u8), true)
        );
        assert_eq!(
            key(Args::new().arg(&1_i32), true),
            key(Args::new().arg(&1_i32), true)
        );
    }

    #[test]
    fn test_keyword_order_is_irrelevant() {
        let a = key(Args::new().kwarg("a", &1).kwarg("b", &2), true);
        let b = key(Args::new().kwarg("b", &2).kwarg("a", &1), true);
        assert_eq!(a, b);
    }

    #[test]
    fn test_keyword_and_positional_do_not_mix() {
        assert_ne!(
            key(Args::new().arg(&1), false),
            key(Args::new().kwarg("a", &1), false)
        );
    }

    #[test]
    fn test_repeated_keyword_keeps_last_value() {
        let args = Args::new().kwarg("page", &1).kwarg("page", &2);
        assert_eq!(args.keywords().len(), 1);
        assert_eq!(key(args, false), key(Args::new().kwarg("page", &2), false));
    }

    #[test]
    fn test_fractional_and_nan_floats() {
        assert_ne!(key(Args::new().arg(&1.5), false), key(Args::new().arg(&1), false));
        assert_eq!(
            key(Args::new().arg(&f64::NAN), false),
            key(Args::new().arg(&f64::NAN), false)
        );
        assert_ne!(
            key(Args::new().arg(&f64::INFINITY), false),
            key(Args::new().arg(&f64::NEG_INFINITY), false)
        );
    }

    #[test]
    fn test_option_and_collections() {
        assert_eq!(
            key(Args::new().arg(&Some(3)), false),
            key(Args::new().arg(&3), false)
        );
        assert_ne!(
            key(Args::new().arg(&None::<i32>), false),
            key(Args::new().arg(&0), false)
        );
        assert_eq!(
            key(Args::new().arg(&vec![1, 2]), false),
            key(Args::new().arg(&[1, 2]), false)
        );
        assert_eq!(
            key(Args::new().arg(&(1, "a")), false),
            key(Args::new().arg(&(1_u64, String::from("a"))), false)
        );
    }

    #[test]
    fn test_receiver_identity_in_key() {
        let a = Arc::new(5_u32);
        let b = Arc::new(5_u32);
        let id_a = Arg::receiver::<u32>(ReceiverHandle::weak(&a).id());
        let id_a2 = Arg::receiver::<u32>(ReceiverHandle::weak(&a).id());
        let id_b = Arg::receiver::<u32>(ReceiverHandle::weak(&b).id());

        let key_a = key(Args::new().arg(&1).with_receiver(id_a), false);
        let key_a2 = key(Args::new().arg(&1).with_receiver(id_a2), false);
        let key_b = key(Args::new().arg(&1).with_receiver(id_b), false);

        assert_eq!(key_a, key_a2);
        assert_ne!(key_a, key_b);
        assert!(!key_a.has_dead_receiver());

        drop(a);
        assert!(key_a.has_dead_receiver());
        assert!(!key_b.has_dead_receiver());
    }

    #[test]
    fn test_byte_arguments() {
        let digest = [1_u8, 2, 3];
        assert_eq!(
            key(Args::new().arg(&ByteArg(digest)), false),
            key(Args::new().arg(&ByteArg(vec![1_u8, 2, 3])), false)
        );
        // Opaque bytes never collide with the same integers as a sequence.
        assert_ne!(
            key(Args::new().arg(&ByteArg(digest)), false),
            key(Args::new().arg(&digest), false)
        );
    }

    #[test]
    fn test_debug_rendering() {
        let k = key(Args::new().arg(&1).arg("x").kwarg("page", &2), false);
        assert_eq!(format!("{:?}", k), r#"[Int(1), Str("x"), page=Int(2)]"#);
    }
}
