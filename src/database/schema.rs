/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Diesel table definitions for the job store.
//!
//! Ids are 32-lowercase-hex strings; timestamps are int64 Unix milliseconds.
//! JSON columns (`targets`, `meta`, `payload`) are serialized text.

diesel::table! {
    jobs (id) {
        id -> Text,
        action -> Text,
        region -> Text,
        targets -> Text,
        meta -> Text,
        status -> Text,
        created_at -> BigInt,
        updated_at -> BigInt,
    }
}

diesel::table! {
    tasks (id) {
        id -> Text,
        job_id -> Text,
        seq -> Integer,
        target -> Text,
        action -> Text,
        region -> Text,
        payload -> Text,
        status -> Text,
        attempt -> Integer,
        created_at -> BigInt,
        updated_at -> BigInt,
    }
}

diesel::joinable!(tasks -> jobs (job_id));
diesel::allow_tables_to_appear_in_same_query!(jobs, tasks);
