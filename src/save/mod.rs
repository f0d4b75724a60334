mod bridge;
mod codec;
mod model;
mod storage;

pub use bridge::{apply_save_data, merge_state, save_data_from_simulation};
pub use codec::{
    decode_payload, export_to_base64, import_from_base64, load_from_json_string,
    save_to_json_string, to_storage_json,
};
pub use model::{SAVE_VERSION, SaveData};
pub use storage::{
    FileStorage, LOAD_SOURCE, MemoryStorage, SAVE_SOURCE, SETTINGS_KEY, Storage, persist, restore,
};
