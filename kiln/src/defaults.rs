use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::filters::BoxedFilter;

#[allow(unused_mut)]
pub(crate) fn get_builtin_filters() -> BTreeMap<Cow<'static, str>, BoxedFilter> {
    let mut rv = BTreeMap::new();
    #[cfg(feature = "builtins")]
    {
        use crate::filters;

        rv.insert("upper".into(), BoxedFilter::new(filters::upper));
        rv.insert("lower".into(), BoxedFilter::new(filters::lower));
        rv.insert("title".into(), BoxedFilter::new(filters::title));
        rv.insert("capitalize".into(), BoxedFilter::new(filters::capitalize));
        rv.insert("trim".into(), BoxedFilter::new(filters::trim));
        rv.insert("replace".into(), BoxedFilter::new(filters::replace));
        rv.insert("length".into(), BoxedFilter::new(filters::length));
        rv.insert("default".into(), BoxedFilter::new(filters::default));
        rv.insert("join".into(), BoxedFilter::new(filters::join));
        rv.insert("escape".into(), BoxedFilter::new(filters::escape));
        rv.insert("e".into(), BoxedFilter::new(filters::escape));
    }
    rv
}
