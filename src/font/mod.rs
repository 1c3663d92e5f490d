use bevy::{asset::AssetApp, prelude::*};
use loader::FontLoader;

mod font;
mod loader;
mod provider;

pub use font::{Font, GlyphId, GlyphInfo};
pub use loader::{DefaultFontFetcher, FetchFuture, FontFetcher, FontLoadError, FontSource};
pub use provider::{
    FontCache, FontProvider, FontProviderReady, FontTable, RetryPolicy, UNIVERSAL_FALLBACKS,
};

use crate::config::FontKey;
use crate::Text3dSet;

/// Registers the `Font` asset and drives the [`FontProvider`].
///
/// A `FontProvider` inserted before this plugin is kept, which is how a custom
/// [`FontFetcher`] gets installed.
#[derive(Default)]
pub struct FontProviderPlugin {
    pub table: FontTable,
    pub retry: RetryPolicy,
}

impl Plugin for FontProviderPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<Font>()
            .init_asset_loader::<FontLoader>()
            .add_event::<FontProviderReady>();

        if !app.world().contains_resource::<FontProvider>() {
            app.insert_resource(FontProvider::new(self.table.clone(), self.retry));
        }

        app.add_systems(Startup, preload_fallback_fonts).add_systems(
            Update,
            (drive_font_loads, adopt_font_assets)
                .chain()
                .in_set(Text3dSet::Fonts),
        );
    }
}

fn preload_fallback_fonts(mut provider: ResMut<FontProvider>) {
    provider.preload(UNIVERSAL_FALLBACKS.iter().map(|key| FontKey::from(*key)));
}

fn drive_font_loads(
    time: Res<Time<Real>>,
    mut provider: ResMut<FontProvider>,
    mut ready: EventWriter<FontProviderReady>,
) {
    provider.update(time.delta());
    if provider.take_ready_signal() {
        ready.send(FontProviderReady);
    }
}

fn adopt_font_assets(
    assets: Res<Assets<Font>>,
    server: Res<AssetServer>,
    mut provider: ResMut<FontProvider>,
    mut ready: EventWriter<FontProviderReady>,
) {
    provider.poll_assets(&assets, &server);
    if provider.take_ready_signal() {
        ready.send(FontProviderReady);
    }
}

#[cfg(test)]
pub(crate) const TEST_FONT_BYTES: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

#[cfg(test)]
pub(crate) fn test_font() -> Font {
    Font::from_bytes(TEST_FONT_BYTES.to_vec()).unwrap()
}
