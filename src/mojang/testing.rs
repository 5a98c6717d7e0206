//! Static [Mojang] implementations for in- and external integration testing. Not used
//! in production builds.

use crate::error::DermaError;
use crate::mojang::{
    Mojang, Profile, ProfileProperty, Texture, Textures, TexturesProperty, UsernameResolved,
    encode_texture_prop,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::LazyLock;
use uuid::{Uuid, uuid};

/// The profile of Notch, carrying a valid encoded textures property.
pub static NOTCH: LazyLock<Profile> = LazyLock::new(|| {
    testing_profile(
        uuid!("069a79f444e94726a5befca90e38aaf5"),
        "Notch",
        "http://textures.minecraft.net/texture/292009a4925b58f02c77dadc3ecef07ea4c7472f64e0fdc32ce5522489362680",
        None,
    )
});

/// The profile of jeb_, carrying both a skin and a cape.
pub static JEB: LazyLock<Profile> = LazyLock::new(|| {
    testing_profile(
        uuid!("853c80ef3c3749fdaa49938b674adae6"),
        "jeb_",
        "http://textures.minecraft.net/texture/7fd9ba42a7c81eeea22f1524271ae85a8e045ce0af5a6ae16c6406ae917e68b5",
        Some("http://textures.minecraft.net/texture/953cac8b779fe41383e675ee2b86071a71658f2180f56fbce8aa315ea70e2ed6"),
    )
});

/// Creates a valid [Profile] with minimal information.
pub fn testing_profile(id: Uuid, name: &str, skin_url: &str, cape_url: Option<&str>) -> Profile {
    let textures = TexturesProperty {
        timestamp: 1_600_000_000,
        profile_id: id,
        profile_name: name.to_string(),
        textures: Textures {
            skin: Some(Texture {
                url: skin_url.to_string(),
                metadata: None,
            }),
            cape: cape_url.map(|url| Texture {
                url: url.to_string(),
                metadata: None,
            }),
        },
    };
    Profile {
        id,
        name: name.to_string(),
        properties: vec![ProfileProperty {
            name: "textures".to_string(),
            value: encode_texture_prop(&textures).expect("expected textures to be serializable"),
            signature: None,
        }],
    }
}

/// The [MojangTestingApi] is a [Mojang] implementation that uses predefined static data
/// instead of actually accessing the mojang api.
#[derive(Default, Debug)]
pub struct MojangTestingApi {
    uuids: HashMap<String, UsernameResolved>,
    profiles: HashMap<Uuid, Profile>,
}

impl MojangTestingApi {
    /// Creates a new empty [MojangTestingApi].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new [MojangTestingApi] with default profiles.
    pub fn with_profiles() -> Self {
        Self::new().add_profile(&NOTCH).add_profile(&JEB)
    }

    /// Adds a profile to the api, resolvable by its name.
    pub fn add_profile(mut self, profile: &Profile) -> Self {
        self.uuids.insert(
            profile.name.to_lowercase(),
            UsernameResolved {
                id: profile.id,
                name: profile.name.clone(),
            },
        );
        self.profiles.insert(profile.id, profile.clone());
        self
    }
}

#[async_trait]
impl Mojang for MojangTestingApi {
    async fn fetch_uuids(
        &self,
        usernames: &[String],
    ) -> Result<Vec<UsernameResolved>, DermaError> {
        let uuids = usernames
            .iter()
            .filter_map(|username| self.uuids.get(&username.to_lowercase()))
            .cloned()
            .collect();
        Ok(uuids)
    }

    async fn fetch_profile(&self, uuid: &Uuid) -> Result<Option<Profile>, DermaError> {
        Ok(self.profiles.get(uuid).cloned())
    }
}
