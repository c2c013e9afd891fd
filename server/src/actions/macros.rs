/*
 * Created on Sun Feb 18 2024
 *
 * This file is a part of Crimson
 * Crimson is a free and open-source in-memory data structure server written
 * by Sayan Nandan ("the Author") with the vision to provide a compact,
 * protocol-compatible store for strings, lists and streams.
 *
 * Copyright (c) 2024, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

#[macro_export]
/// ## The action macro
///
/// A macro for adding all the _fuss_ to an action: the asyncness, the return
/// type and the doc attributes, so that implementing an action is just a
/// matter of writing what it does. Every action resolves to
/// `ActionResult<Response>`; the dispatcher renders the response
macro_rules! action {
    (
        $($(#[$attr:meta])*
        fn $fname:ident($($arg:tt)*)
        $block:block)*
    ) => {
        $($(#[$attr])*
        pub async fn $fname(
            $($arg)*
        ) -> $crate::actions::ActionResult<$crate::resp::Response>
        $block)*
    };
}
