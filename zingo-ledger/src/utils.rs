//! Builder helpers for test fixtures.

#[cfg(test)]
macro_rules! build_method {
    ($name:ident, $localtype:ty) => {
        #[doc = "Set the $name field of the builder."]
        pub fn $name(&mut self, $name: $localtype) -> &mut Self {
            self.$name = Some($name);
            self
        }
    };
}

#[cfg(test)]
pub(crate) use build_method;
