//! Algorithms over `SurfaceMesh`: components, attribute transfer, conversion and cleanup.

pub mod cast_attribute;
pub mod cleanup;
pub mod combine;
pub mod components;
pub mod inverse_mapping;
pub mod map_attribute;
pub mod map_attributes;
pub mod mapping_policy;
pub mod remap_vertices;
pub mod submesh;
pub mod unify_index_buffer;
pub mod weld_indexed_attribute;

pub use cast_attribute::{cast_attribute, cast_attribute_in_place};
pub use cleanup::{
    RemoveDuplicateFacetOptions, RemoveDuplicateVerticesOptions, remove_duplicate_facets,
    remove_duplicate_vertices, remove_isolated_vertices, remove_topologically_degenerate_facets,
};
pub use combine::combine_meshes;
pub use components::{
    ComponentOptions, ConnectivityType, SeparateOptions, compute_components, facet_component_ids,
    separate_by_components,
};
pub use inverse_mapping::{InverseMapping, invert_mapping};
pub use map_attribute::{MapTarget, map_attribute, map_attribute_in_place};
pub use map_attributes::{MapAttributesOptions, map_attributes};
pub use mapping_policy::{CollisionPolicies, MappingPolicy, remap_rows};
pub use remap_vertices::{RemapVerticesOptions, remap_vertices};
pub use submesh::{SubmeshOptions, extract_submesh};
pub use unify_index_buffer::{unify_index_buffer, unify_named_index_buffer};
pub use weld_indexed_attribute::{WeldOptions, weld_indexed_attribute};
