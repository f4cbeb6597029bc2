pub mod providers;

pub use providers::{
    FilterOptions, ProviderFilters, Sort, cheapest_price, filter_options, query_providers,
};
