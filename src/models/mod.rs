//! Import models: collections, environments, globals and parameter sets

pub mod collection;
pub mod environment;
pub mod params;

pub use collection::{
    AuthTemplate, BodyMode, Collection, CollectionItem, Event, FlatRequest, FormParam,
    HeaderEntry, ItemKind, Listen, RequestBodyTemplate, RequestTemplate, RequestUrl,
};
pub use environment::{load_globals, EnvironmentFile, EnvironmentValue};
pub use params::{parse_bulk, ParameterList, ParameterSet};
