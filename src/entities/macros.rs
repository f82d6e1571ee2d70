//! Macros for reducing boilerplate when defining resources

/// Declare the closed field enum of a resource
///
/// Generates the enum and its [`ResourceField`](crate::core::resource::ResourceField)
/// implementation. Each variant is mapped to the field name used in stored
/// documents and request bodies.
///
/// # Example
///
/// ```rust
/// use m3allem::resource_fields;
/// use m3allem::core::resource::ResourceField;
///
/// resource_fields! {
///     pub enum TicketField {
///         Title => "title",
///         Status => "status",
///     }
/// }
///
/// assert_eq!(TicketField::Status.as_str(), "status");
/// assert_eq!(TicketField::from_name("title"), Some(TicketField::Title));
/// assert_eq!(TicketField::from_name("owner"), None);
/// ```
#[macro_export]
macro_rules! resource_fields {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $field:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $crate::core::resource::ResourceField for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $field),+
                }
            }
        }
    };
}
