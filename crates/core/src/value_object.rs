//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects carry no identity and are compared by their attribute values
/// (e.g. [`Money`](crate::Money)). Two amounts of `10.00` are the same amount; two
/// products with the same description are still two products.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
